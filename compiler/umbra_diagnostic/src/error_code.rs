use std::fmt;

/// Error codes for front-end diagnostics.
///
/// Format: E#### where the first digit indicates the phase:
/// - E2xxx: Type errors (E21xx: generics)
/// - E9xxx: Internal compiler errors
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub enum ErrorCode {
    // Type Errors (E20xx)
    /// Type mismatch
    E2001,
    /// Unknown type
    E2002,
    /// Unknown identifier
    E2003,
    /// Unknown member
    E2004,
    /// Operator not supported by operand type
    E2005,
    /// Wrong number of call arguments
    E2006,

    // Generic Errors (E21xx)
    /// Malformed generic declaration
    E2101,
    /// Unsatisfied constraint
    E2102,
    /// Generic parameter cannot be inferred
    E2103,
    /// Ambiguous inferred type argument
    E2104,
    /// Ambiguous inferred value argument
    E2105,
    /// Pack length mismatch
    E2106,
    /// Illegal pack position
    E2107,
    /// Coercion constraint outside an extension
    E2108,
    /// Too many generic arguments
    E2109,
    /// Type given for a value parameter or vice versa
    E2110,
    /// Call argument count does not fit the parameter list
    E2111,
    /// Call argument not convertible to the parameter type
    E2112,
    /// Instantiation depth limit exceeded
    E2113,
    /// Unknown generic declaration
    E2114,

    // Internal Errors (E9xxx)
    /// Internal compiler error
    E9001,
    /// Too many errors
    E9002,
}

impl ErrorCode {
    /// Check if this code belongs to the generics range (E21xx).
    pub fn is_generic_error(&self) -> bool {
        self.as_str().starts_with("E21")
    }

    /// Get the numeric code as a string (e.g., "E2101").
    pub fn as_str(&self) -> &'static str {
        match self {
            // Type
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E2004 => "E2004",
            ErrorCode::E2005 => "E2005",
            ErrorCode::E2006 => "E2006",
            // Generics
            ErrorCode::E2101 => "E2101",
            ErrorCode::E2102 => "E2102",
            ErrorCode::E2103 => "E2103",
            ErrorCode::E2104 => "E2104",
            ErrorCode::E2105 => "E2105",
            ErrorCode::E2106 => "E2106",
            ErrorCode::E2107 => "E2107",
            ErrorCode::E2108 => "E2108",
            ErrorCode::E2109 => "E2109",
            ErrorCode::E2110 => "E2110",
            ErrorCode::E2111 => "E2111",
            ErrorCode::E2112 => "E2112",
            ErrorCode::E2113 => "E2113",
            ErrorCode::E2114 => "E2114",
            // Internal
            ErrorCode::E9001 => "E9001",
            ErrorCode::E9002 => "E9002",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::E2106.to_string(), "E2106");
        assert_eq!(ErrorCode::E2001.as_str(), "E2001");
    }

    #[test]
    fn generic_range() {
        assert!(ErrorCode::E2107.is_generic_error());
        assert!(!ErrorCode::E2003.is_generic_error());
        assert!(!ErrorCode::E9001.is_generic_error());
    }
}
