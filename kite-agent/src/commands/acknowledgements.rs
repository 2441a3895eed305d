//! Third-party license notices

use std::io::Read;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;

static ACKNOWLEDGEMENTS_GZ: &[u8] = include_bytes!("../../assets/acknowledgements.md.gz");

const PLACEHOLDER: &str = "# Acknowledgements\n\n\
    License notices were not bundled with this build.\n";

/// Print the bundled notices
pub fn print_acknowledgements() -> Result<()> {
    print!("{}", acknowledgements(ACKNOWLEDGEMENTS_GZ)?);
    Ok(())
}

/// Decompresses the notices
///
/// A build without bundled notices embeds an empty file and gets the
/// placeholder; a bundle that fails to decompress is an error.
fn acknowledgements(compressed: &[u8]) -> Result<String> {
    if compressed.is_empty() {
        return Ok(PLACEHOLDER.to_string());
    }

    let mut text = String::new();
    GzDecoder::new(compressed)
        .read_to_string(&mut text)
        .context("Couldn't decompress embedded acknowledgements")?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    #[test]
    fn test_bundled_notices() {
        let text = acknowledgements(ACKNOWLEDGEMENTS_GZ).unwrap();
        assert!(text.starts_with("# Acknowledgements"));
        assert!(text.contains("reqwest"));
    }

    #[test]
    fn test_round_trip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"notices").unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(acknowledgements(&compressed).unwrap(), "notices");
    }

    #[test]
    fn test_missing_bundle_uses_placeholder() {
        assert_eq!(acknowledgements(&[]).unwrap(), PLACEHOLDER);
    }

    #[test]
    fn test_corrupt_bundle_is_an_error() {
        let err = acknowledgements(b"not gzip").unwrap_err();
        assert!(err.to_string().contains("decompress"));
    }
}
