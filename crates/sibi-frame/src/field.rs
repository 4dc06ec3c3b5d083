use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// A single outbound field value.
///
/// Values are rendered as text. Booleans go out as `1`/`0`, never as words.
/// [`Field::Absent`] exists so optional inputs can be passed straight through
/// and rejected at encode time instead of silently becoming empty strings.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Absent,
}

impl Field {
    /// An empty text field.
    pub fn empty() -> Self {
        Field::Text(String::new())
    }

    /// Append this field and its NUL terminator to `dst`.
    ///
    /// `index` is only used to report which field was rejected.
    pub fn write_to(&self, index: usize, dst: &mut BytesMut) -> Result<()> {
        match self {
            Field::Text(text) => {
                if text.as_bytes().contains(&0) {
                    return Err(FrameError::InvalidField {
                        index,
                        reason: "embedded NUL byte",
                    });
                }
                dst.put_slice(text.as_bytes());
            }
            Field::Int(value) => dst.put_slice(value.to_string().as_bytes()),
            Field::Float(value) => dst.put_slice(value.to_string().as_bytes()),
            Field::Bool(value) => dst.put_u8(if *value { b'1' } else { b'0' }),
            Field::Absent => {
                return Err(FrameError::InvalidField {
                    index,
                    reason: "absent value",
                })
            }
        }
        dst.put_u8(0);
        Ok(())
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Text(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Text(value)
    }
}

impl From<&String> for Field {
    fn from(value: &String) -> Self {
        Field::Text(value.clone())
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Field::Int(value)
    }
}

impl From<i32> for Field {
    fn from(value: i32) -> Self {
        Field::Int(i64::from(value))
    }
}

impl From<u32> for Field {
    fn from(value: u32) -> Self {
        Field::Int(i64::from(value))
    }
}

impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Field::Float(value)
    }
}

impl From<bool> for Field {
    fn from(value: bool) -> Self {
        Field::Bool(value)
    }
}

impl<T: Into<Field>> From<Option<T>> for Field {
    fn from(value: Option<T>) -> Self {
        value.map_or(Field::Absent, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(field: Field) -> Result<Vec<u8>> {
        let mut buf = BytesMut::new();
        field.write_to(0, &mut buf)?;
        Ok(buf.to_vec())
    }

    #[test]
    fn booleans_are_numeric() {
        assert_eq!(render(Field::from(true)).unwrap(), b"1\0");
        assert_eq!(render(Field::from(false)).unwrap(), b"0\0");
    }

    #[test]
    fn numbers_render_as_text() {
        assert_eq!(render(Field::from(71)).unwrap(), b"71\0");
        assert_eq!(render(Field::from(-1i64)).unwrap(), b"-1\0");
        assert_eq!(render(Field::from(1.5)).unwrap(), b"1.5\0");
    }

    #[test]
    fn absent_is_rejected() {
        let err = render(Field::from(None::<String>)).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidField {
                reason: "absent value",
                ..
            }
        ));
    }

    #[test]
    fn embedded_nul_is_rejected() {
        let err = render(Field::from("a\0b")).unwrap_err();
        assert!(matches!(err, FrameError::InvalidField { index: 0, .. }));
    }

    #[test]
    fn present_option_passes_through() {
        assert_eq!(render(Field::from(Some("SMART"))).unwrap(), b"SMART\0");
        assert_eq!(render(Field::empty()).unwrap(), b"\0");
    }
}
