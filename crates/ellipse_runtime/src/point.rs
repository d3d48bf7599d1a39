//! # File Points
//!
//! Source locations attached to diagnostics.

use std::fmt;

/// A location in the source: `file:line:column` inside `function`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FilePoint {
    /// Source file path.
    pub file: &'static str,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
    /// Enclosing function, or the module path when no name was given.
    pub function: &'static str,
}

impl FilePoint {
    /// Creates a point.
    #[inline]
    #[must_use]
    pub const fn new(file: &'static str, line: u32, column: u32, function: &'static str) -> Self {
        Self {
            file,
            line,
            column,
            function,
        }
    }
}

impl fmt::Display for FilePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Captures the current [`FilePoint`].
///
/// `file_point!()` records the module path as the function;
/// `file_point!("name")` records the given name.
#[macro_export]
macro_rules! file_point {
    () => {
        $crate::FilePoint::new(file!(), line!(), column!(), module_path!())
    };
    ($function:expr) => {
        $crate::FilePoint::new(file!(), line!(), column!(), $function)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macro_captures_location() {
        let point = crate::file_point!("test_macro_captures_location");
        assert!(point.file.ends_with("point.rs"));
        assert!(point.line > 0);
        assert_eq!(point.function, "test_macro_captures_location");

        let anonymous = crate::file_point!();
        assert_eq!(anonymous.function, module_path!());
    }

    #[test]
    fn test_display() {
        let point = FilePoint::new("src/main.rs", 12, 5, "main");
        assert_eq!(point.to_string(), "src/main.rs:12:5");
    }
}
