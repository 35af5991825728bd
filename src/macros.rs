/**
 A compile time assert, mirroring `static_assert` from C++

 # Examples
 ```ignore
 const CONSTANT_VALUE: usize = 68;
 const_assert!(2 + 2 == 4);
 const_assert!(CONSTANT_VALUE % 4 == 0, "header must stay 4 byte aligned");
 ```
*/
macro_rules! const_assert {
    ($cond:expr $(,)?) => {
        const _: () = {
            if !$cond {
                panic!(concat!("const assertion failed: ", stringify!($cond)));
            }
        };
    };
    ($cond:expr, $($arg:tt)+) => {
        const _: () = {
            if !$cond {
                panic!($($arg)+);
            }
        };
    };
}

/**
 Skips "." and ".." records without building a string.

 The name of a record is stored as UTF-16LE, so "." is the two bytes `2E 00`
 and ".." is the four bytes `2E 00 2E 00`.

 Only the name decides: a backend that could not stat the entry may report the
 dot entries without the directory attribute.
*/
macro_rules! skip_dot_or_dot_dot_entries {
    ($record:expr, $action:expr) => {{
        match $record.name_bytes() {
            [b'.', 0] | [b'.', 0, b'.', 0] => $action,
            _ => (),
        }
    }};
}
