use crate::error::{Error, Result};

pub const ROW_DELIMITER: char = '\n';
pub const FIELD_DELIMITER: char = '\t';

const DEFAULT_CAPACITY: usize = 250;
// Head room added whenever a payload outgrows the row storage.
const SPARE_ROWS: usize = 100;

/// Storage for the commands parsed out of one response payload.
///
/// Row storage only ever grows. A payload with fewer rows than the storage holds leaves the
/// remaining rows untouched; they are simply outside of `len()`.
#[derive(Debug)]
pub struct CommandBatch {
    rows: Vec<Vec<String>>,
    len: usize,
}

impl CommandBatch {
    pub fn new() -> CommandBatch {
        CommandBatch::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(rows: usize) -> CommandBatch {
        CommandBatch {
            rows: (0..rows).map(|_| Vec::new()).collect(),
            len: 0,
        }
    }

    /// Replaces the contents of the batch with the commands in `raw`.
    ///
    /// Rows end with a line feed and fields are separated by a tab. There is no escaping, an
    /// embedded delimiter always splits. Text after the last line feed is an incomplete row
    /// and is dropped.
    pub fn parse(&mut self, raw: &str) {
        self.len = 0;
        let terminated = raw.rfind(ROW_DELIMITER).map_or("", |end| &raw[..=end]);
        for (index, line) in terminated.split_terminator(ROW_DELIMITER).enumerate() {
            if index == self.rows.len() {
                self.rows.resize_with(index + SPARE_ROWS, Vec::new);
            }
            let row = &mut self.rows[index];
            row.clear();
            row.extend(line.split(FIELD_DELIMITER).map(str::to_owned));
            self.len = index + 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of rows the backing storage can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.rows.len()
    }

    pub fn command(&self, index: usize) -> Result<Command<'_>> {
        if index >= self.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        Ok(Command {
            fields: &self.rows[index],
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Command<'_>> {
        self.rows[..self.len].iter().map(|fields| Command { fields })
    }

    pub fn as_immutable(&self) -> ImmutableCommandBatch<'_> {
        ImmutableCommandBatch { batch: self }
    }
}

impl Default for CommandBatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a [`CommandBatch`]. It borrows the batch instead of copying it, so it
/// always shows the most recent parse and cannot outlive it.
#[derive(Debug, Copy, Clone)]
pub struct ImmutableCommandBatch<'a> {
    batch: &'a CommandBatch,
}

impl<'a> ImmutableCommandBatch<'a> {
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub fn command(&self, index: usize) -> Result<Command<'a>> {
        self.batch.command(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = Command<'a>> {
        self.batch.iter()
    }

    /// Commands whose discriminator equals `tag`, in payload order.
    pub fn tagged(&self, tag: &'a str) -> impl Iterator<Item = Command<'a>> {
        self.batch.iter().filter(move |c| c.tag() == tag)
    }
}

/// One parsed row. Field 0 is the discriminator tag.
#[derive(Debug, Copy, Clone)]
pub struct Command<'a> {
    fields: &'a [String],
}

impl<'a> Command<'a> {
    pub fn tag(&self) -> &'a str {
        self.fields.first().map(String::as_str).unwrap_or("")
    }

    pub fn fields(&self) -> &'a [String] {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a str> {
        self.fields.get(index).map(String::as_str)
    }

    pub fn field(&self, index: usize) -> Result<&'a str> {
        self.get(index)
            .ok_or_else(|| self.malformed(index, "missing field"))
    }

    /// Coerces a field to a float the way the remote side formats numbers.
    pub fn number(&self, index: usize) -> Result<f64> {
        let raw = self.field(index)?;
        raw.trim()
            .parse::<f64>()
            .map_err(|_| self.malformed(index, &format!("{:?} is not a number", raw)))
    }

    /// Coerces a field to an integer. Fractional values are truncated.
    pub fn integer(&self, index: usize) -> Result<i64> {
        let raw = self.field(index)?.trim();
        if let Ok(value) = raw.parse::<i64>() {
            return Ok(value);
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value.trunc() as i64),
            _ => Err(self.malformed(index, &format!("{:?} is not an integer", raw))),
        }
    }

    pub fn index(&self, index: usize) -> Result<usize> {
        let value = self.integer(index)?;
        usize::try_from(value).map_err(|_| self.malformed(index, "negative index"))
    }

    /// Non-negative integer that fits a `u32`, such as a command code.
    pub fn code(&self, index: usize) -> Result<u32> {
        let value = self.integer(index)?;
        u32::try_from(value)
            .map_err(|_| self.malformed(index, &format!("{} is out of range", value)))
    }

    pub fn require(&self, fields: usize) -> Result<()> {
        if self.fields.len() < fields {
            return Err(self.malformed(
                self.fields.len(),
                &format!("expected {} fields, found {}", fields, self.fields.len()),
            ));
        }
        Ok(())
    }

    fn malformed(&self, field: usize, reason: &str) -> Error {
        Error::MalformedRow {
            tag: self.tag().to_string(),
            field,
            reason: reason.to_string(),
        }
    }
}
