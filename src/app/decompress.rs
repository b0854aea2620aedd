//! Payload decompression
//!
//! DWD publishes GRIB2 files bzip2-compressed. The compression is detected from
//! the file name suffix; gzip is handled the same way for mirrors that
//! recompress, and anything else is written out unchanged.

use std::io::Read;

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;

use crate::constants::files::{BZIP2_SUFFIX, GZIP_SUFFIX};

/// Compression of a published file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Bzip2,
    Gzip,
}

impl Compression {
    /// Detect compression from a file name
    pub fn from_file_name(name: &str) -> Self {
        if name.ends_with(BZIP2_SUFFIX) {
            Compression::Bzip2
        } else if name.ends_with(GZIP_SUFFIX) {
            Compression::Gzip
        } else {
            Compression::None
        }
    }

    /// File name suffix, empty for uncompressed files
    pub fn suffix(self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Bzip2 => BZIP2_SUFFIX,
            Compression::Gzip => GZIP_SUFFIX,
        }
    }

    /// Remove the compression suffix from a file name
    pub fn strip_suffix(self, name: &str) -> &str {
        name.strip_suffix(self.suffix()).unwrap_or(name)
    }

    /// Decompress a complete payload
    pub fn decompress(self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        // GRIB2 fields typically expand 3-5x
        let mut out = Vec::with_capacity(data.len().saturating_mul(4));
        match self {
            Compression::None => out.extend_from_slice(data),
            Compression::Bzip2 => {
                MultiBzDecoder::new(data).read_to_end(&mut out)?;
            }
            Compression::Gzip => {
                MultiGzDecoder::new(data).read_to_end(&mut out)?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PAYLOAD: &[u8] = b"GRIB\x00\x00\x00\x02 fake field data 7777";

    fn bzip2_bytes(data: &[u8]) -> Vec<u8> {
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn gzip_bytes(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_detect_and_strip() {
        let name = "icon-d2_germany_regular-lat-lon_single-level_2020120312_000_2d_t_2m.grib2.bz2";
        let compression = Compression::from_file_name(name);
        assert_eq!(compression, Compression::Bzip2);
        assert!(compression.strip_suffix(name).ends_with(".grib2"));

        assert_eq!(Compression::from_file_name("a.grib2.gz"), Compression::Gzip);
        assert_eq!(Compression::from_file_name("a.grib2"), Compression::None);
        assert_eq!(Compression::None.strip_suffix("a.grib2"), "a.grib2");
    }

    #[test]
    fn test_decompress_bzip2() {
        let compressed = bzip2_bytes(PAYLOAD);
        assert_eq!(Compression::Bzip2.decompress(&compressed).unwrap(), PAYLOAD);
    }

    #[test]
    fn test_decompress_gzip() {
        let compressed = gzip_bytes(PAYLOAD);
        assert_eq!(Compression::Gzip.decompress(&compressed).unwrap(), PAYLOAD);
    }

    #[test]
    fn test_corrupt_payload() {
        assert!(Compression::Bzip2.decompress(b"not bzip2 at all").is_err());
        assert!(Compression::Gzip.decompress(b"not gzip either").is_err());
        assert_eq!(Compression::None.decompress(PAYLOAD).unwrap(), PAYLOAD);
    }
}
