use super::GbxError;

/// Little-endian cursor over a header chunk with lookback-string state
pub(crate) struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
    lookback: Option<Vec<String>>,
}

impl<'a> ChunkReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            lookback: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8], GbxError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(GbxError::UnexpectedEof { offset: self.pos })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, GbxError> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, GbxError> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, GbxError> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn bool(&mut self) -> Result<bool, GbxError> {
        Ok(self.u32()? != 0)
    }

    /// Length-prefixed string, decoded lossily
    pub(crate) fn string(&mut self) -> Result<String, GbxError> {
        let len = self.u32()? as usize;
        let raw = self.bytes(len)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    /// Lookback string: either new, a back-reference, or a numeric collection id
    pub(crate) fn lookback_string(&mut self) -> Result<String, GbxError> {
        if self.lookback.is_none() {
            let version = self.u32()?;
            if version < 2 {
                return Err(GbxError::Unsupported(format!(
                    "lookback string version {version}"
                )));
            }
            self.lookback = Some(Vec::new());
        }

        let index = self.u32()?;
        if index == u32::MAX {
            return Ok(String::new());
        }
        if index >> 30 == 0 {
            return Ok(collection_name(index));
        }

        let slot = (index & 0x3FFF_FFFF) as usize;
        if slot == 0 {
            let value = self.string()?;
            if let Some(list) = self.lookback.as_mut() {
                list.push(value.clone());
            }
            return Ok(value);
        }

        self.lookback
            .as_ref()
            .and_then(|list| list.get(slot - 1))
            .cloned()
            .ok_or(GbxError::BadLookback {
                index,
                offset: self.pos,
            })
    }

    /// Map uid, collection and author, in that order
    pub(crate) fn meta(&mut self) -> Result<(String, String, String), GbxError> {
        Ok((
            self.lookback_string()?,
            self.lookback_string()?,
            self.lookback_string()?,
        ))
    }
}

/// Well-known numeric collection ids
fn collection_name(id: u32) -> String {
    match id {
        0 => "Desert",
        1 => "Snow",
        2 => "Rally",
        3 => "Island",
        4 => "Bay",
        5 => "Coast",
        6 | 26 => "Stadium",
        other => return other.to_string(),
    }
    .to_string()
}
