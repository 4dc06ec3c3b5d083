use super::{CodecError, Result};

/// Sequential reader over the text fields of one inbound message.
///
/// Empty numeric fields read as zero, the way the server leaves unset values
/// blank.
#[derive(Debug)]
pub struct FieldCursor<'a> {
    fields: &'a [String],
    pos: usize,
    msg_id: i64,
}

impl<'a> FieldCursor<'a> {
    /// Start reading `fields`. The leading message id is consumed here.
    pub fn new(fields: &'a [String]) -> Result<Self> {
        let first = fields.first().ok_or(CodecError::Empty)?;
        let msg_id = first.trim().parse().map_err(|_| CodecError::InvalidValue {
            msg_id: -1,
            field: "message id",
            value: first.clone(),
        })?;
        Ok(Self {
            fields,
            pos: 1,
            msg_id,
        })
    }

    pub fn msg_id(&self) -> i64 {
        self.msg_id
    }

    pub fn remaining(&self) -> usize {
        self.fields.len().saturating_sub(self.pos)
    }

    pub fn next_str(&mut self, field: &'static str) -> Result<&'a str> {
        let value = self.fields.get(self.pos).ok_or(CodecError::Truncated {
            msg_id: self.msg_id,
            field,
        })?;
        self.pos += 1;
        Ok(value.as_str())
    }

    pub fn next_string(&mut self, field: &'static str) -> Result<String> {
        self.next_str(field).map(str::to_string)
    }

    pub fn next_int(&mut self, field: &'static str) -> Result<i64> {
        let raw = self.next_str(field)?.trim();
        if raw.is_empty() {
            return Ok(0);
        }
        raw.parse().map_err(|_| self.invalid(field, raw))
    }

    pub fn next_f64(&mut self, field: &'static str) -> Result<f64> {
        Ok(self.next_opt_f64(field)?.unwrap_or(0.0))
    }

    /// A double where blank or the max-double marker means "unset".
    pub fn next_opt_f64(&mut self, field: &'static str) -> Result<Option<f64>> {
        let raw = self.next_str(field)?.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let value: f64 = raw.parse().map_err(|_| self.invalid(field, raw))?;
        Ok((value != f64::MAX).then_some(value))
    }

    pub fn next_bool(&mut self, field: &'static str) -> Result<bool> {
        Ok(self.next_int(field)? != 0)
    }

    /// Skip `count` fields; fails if fewer remain.
    pub fn skip(&mut self, count: usize, field: &'static str) -> Result<()> {
        for _ in 0..count {
            self.next_str(field)?;
        }
        Ok(())
    }

    fn invalid(&self, field: &'static str, raw: &str) -> CodecError {
        CodecError::InvalidValue {
            msg_id: self.msg_id,
            field,
            value: raw.to_string(),
        }
    }
}
