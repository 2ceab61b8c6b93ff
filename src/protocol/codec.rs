use super::machine_enum::*;

/// Implements the encode part of an encode/decode pair for a frame or frame field.
pub trait PartialEncode {
    fn partial_encode(&self, out: &mut Vec<u8>);

    fn encode(&self) -> Vec<u8> {
        let mut v = vec![];
        self.partial_encode(&mut v);
        v
    }
}

impl PartialEncode for u8 {
    fn partial_encode(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
}

impl PartialEncode for u16 {
    fn partial_encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }
}

impl<T: PartialEncode> PartialEncode for Vec<T> {
    fn partial_encode(&self, out: &mut Vec<u8>) {
        for t in self.iter() {
            t.partial_encode(out);
        }
    }
}

impl<T> PartialEncode for MachineEnum<T>
where
    T: TryFrom<u8> + Copy,
    u8: From<T>,
{
    fn partial_encode(&self, out: &mut Vec<u8>) {
        out.push((*self).into())
    }
}

/// Implements the decode part of an encode/decode pair for a frame or frame field.
pub trait PartialDecode<T> {
    /// Partially decodes this type from a buffer, advancing the input slice to the next item.
    fn partial_decode(input: &mut &[u8]) -> Option<T>;

    /// Decode a buffer fully, returning the unparsed remainder if available
    fn decode(mut input: &[u8]) -> (Option<T>, &[u8]) {
        let ret = Self::partial_decode(&mut input);
        (ret, input)
    }
}

impl PartialDecode<u8> for u8 {
    fn partial_decode(input: &mut &[u8]) -> Option<u8> {
        let (head, tail) = input.split_first()?;
        *input = tail;
        Some(*head)
    }
}

impl PartialDecode<u16> for u16 {
    fn partial_decode(input: &mut &[u8]) -> Option<u16> {
        if input.len() < 2 {
            return None;
        }
        let value = u16::from_be_bytes([input[0], input[1]]);
        *input = &input[2..];
        Some(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn u16_is_big_endian() {
        assert_eq!(0x1234_u16.encode(), vec![0x12, 0x34]);
        let (value, rest) = <u16>::decode(&[0x12, 0x34, 0x56]);
        assert_eq!(value, Some(0x1234));
        assert_eq!(rest, &[0x56]);
    }

    #[test]
    fn short_u16_does_not_advance() {
        let mut input: &[u8] = &[0x12];
        assert_eq!(<u16>::partial_decode(&mut input), None);
        assert_eq!(input, &[0x12]);
    }
}
