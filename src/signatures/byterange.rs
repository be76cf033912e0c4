//! ByteRange handling for PDF signatures.
//!
//! A signature dictionary's `/ByteRange` is an array of four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset where the `/Contents` value begins
//! - `offset2` = byte offset where the `/Contents` value ends
//! - `length2` = remaining bytes to the end of the signed revision
//!
//! The array doubles as the key of the nested-revision memo: two attestations
//! claiming the same four integers share the same prior revision.

use crate::error::{Error, Result};
use crate::object::Object;

/// A parsed `/ByteRange` array, compared by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteRange([i64; 4]);

impl ByteRange {
    /// Wrap four integers after checking they describe two ordered, non-negative segments.
    pub fn new(values: [i64; 4]) -> Result<Self> {
        let [offset1, length1, offset2, length2] = values;
        if values.iter().any(|v| *v < 0) {
            return Err(Error::InvalidByteRange(format!("negative value in {}", Self(values))));
        }
        let first_end = offset1
            .checked_add(length1)
            .ok_or_else(|| Error::InvalidByteRange("first segment overflows".to_string()))?;
        if first_end > offset2 {
            return Err(Error::InvalidByteRange(format!(
                "first segment ends at {} after second segment start {}",
                first_end, offset2
            )));
        }
        offset2
            .checked_add(length2)
            .ok_or_else(|| Error::InvalidByteRange("second segment overflows".to_string()))?;
        Ok(Self(values))
    }

    /// Read a `/ByteRange` array object.
    pub fn parse(obj: &Object) -> Result<Self> {
        let array = obj
            .as_array()
            .ok_or_else(|| Error::InvalidByteRange(format!("expected array, found {}", obj.type_name())))?;
        if array.len() != 4 {
            return Err(Error::InvalidByteRange(format!("expected 4 elements, found {}", array.len())));
        }
        let mut values = [0i64; 4];
        for (slot, item) in values.iter_mut().zip(array) {
            *slot = item
                .as_integer()
                .ok_or_else(|| Error::InvalidByteRange(format!("non-integer element {}", item.type_name())))?;
        }
        Self::new(values)
    }

    /// The raw four integers.
    pub fn as_array(&self) -> [i64; 4] {
        self.0
    }

    /// Length of the document prefix that existed before this attestation's
    /// `/Contents` value was written (`offset1 + length1`).
    pub fn prior_revision_len(&self) -> usize {
        (self.0[0] + self.0[1]) as usize
    }

    /// End of the signed revision (`offset2 + length2`).
    pub fn signed_revision_len(&self) -> usize {
        (self.0[2] + self.0[3]) as usize
    }

    /// Concatenate the two covered segments of `data`.
    pub fn signed_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let [offset1, length1, offset2, length2] = self.0.map(|v| v as usize);

        if offset1 + length1 > data.len() {
            return Err(Error::InvalidByteRange(format!(
                "first range exceeds data size: {} + {} > {}",
                offset1,
                length1,
                data.len()
            )));
        }
        if offset2 + length2 > data.len() {
            return Err(Error::InvalidByteRange(format!(
                "second range exceeds data size: {} + {} > {}",
                offset2,
                length2,
                data.len()
            )));
        }

        let mut signed = Vec::with_capacity(length1 + length2);
        signed.extend_from_slice(&data[offset1..offset1 + length1]);
        signed.extend_from_slice(&data[offset2..offset2 + length2]);
        Ok(signed)
    }

    /// Check that the range starts at 0 and ends exactly at `file_size`.
    pub fn validate(&self, file_size: usize) -> Result<()> {
        if self.0[0] != 0 {
            return Err(Error::InvalidByteRange(format!("must start at 0, got {}", self.0[0])));
        }
        if self.signed_revision_len() != file_size {
            return Err(Error::InvalidByteRange(format!(
                "must end at revision size {}, got {}",
                file_size,
                self.signed_revision_len()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {} {} {}]", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}
