//! Base type constants shared by type handlers and storage.

use crate::error::TypeError;
use crate::value::Value;

/// Storage-level kind of a field, stored in the `type` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    NoValue,
    String,
    Numeric,
    Date,
    DateTime,
    Time,
    ChildModel,
}

impl BaseType {
    pub const ALL: [BaseType; 7] = [
        BaseType::NoValue,
        BaseType::String,
        BaseType::Numeric,
        BaseType::Date,
        BaseType::DateTime,
        BaseType::Time,
        BaseType::ChildModel,
    ];

    /// Integer constant as stored in metadata.
    pub const fn code(self) -> i64 {
        match self {
            BaseType::NoValue => 0,
            BaseType::String => 1,
            BaseType::Numeric => 2,
            BaseType::Date => 3,
            BaseType::DateTime => 4,
            BaseType::Time => 5,
            BaseType::ChildModel => 6,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Lower-case name used in definitions and CLI output.
    pub const fn name(self) -> &'static str {
        match self {
            BaseType::NoValue => "novalue",
            BaseType::String => "string",
            BaseType::Numeric => "numeric",
            BaseType::Date => "date",
            BaseType::DateTime => "datetime",
            BaseType::Time => "time",
            BaseType::ChildModel => "child_model",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        Self::ALL.into_iter().find(|t| t.name() == lower)
    }
}

impl TryFrom<i64> for BaseType {
    type Error = TypeError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(TypeError::UnknownBaseType(code))
    }
}

impl From<BaseType> for Value {
    fn from(base: BaseType) -> Self {
        Value::Int(base.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_constants() {
        assert_eq!(BaseType::NoValue.code(), 0);
        assert_eq!(BaseType::ChildModel.code(), 6);
        assert_eq!(BaseType::try_from(4).unwrap(), BaseType::DateTime);
        assert!(BaseType::try_from(9).is_err());
        assert_eq!(BaseType::from_name("DATE"), Some(BaseType::Date));
    }
}
