use byteorder::{LittleEndian, WriteBytesExt};

/// Appends the little-endian encodings used throughout the image format.
pub trait WriteImageExt {
    fn put_u8(&mut self, v: u8);
    fn put_i32(&mut self, v: i32);
    fn put_f32(&mut self, v: f32);
}

/// Enable writing image values to `Vec<u8>`. Writes to a `Vec` cannot
/// fail, so these do not surface `io::Result`.
impl WriteImageExt for Vec<u8> {
    fn put_u8(&mut self, v: u8) {
        self.write_u8(v).unwrap()
    }

    fn put_i32(&mut self, v: i32) {
        self.write_i32::<LittleEndian>(v).unwrap()
    }

    fn put_f32(&mut self, v: f32) {
        self.write_f32::<LittleEndian>(v).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::WriteImageExt;

    #[test]
    fn little_endian_i32() {
        let mut out: Vec<u8> = vec![];
        out.put_i32(150);
        assert_eq!(out, [0x96, 0x00, 0x00, 0x00])
    }

    #[test]
    fn ieee_f32() {
        let mut out: Vec<u8> = vec![];
        out.put_f32(1.0);
        assert_eq!(out, [0x00, 0x00, 0x80, 0x3f])
    }
}
