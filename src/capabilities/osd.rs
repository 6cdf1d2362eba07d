//! Orientation and script detection via tesseract's OSD mode.

use std::path::Path;
use std::process::Command;

use image::GrayImage;
use tempfile::TempDir;

use super::OrientationClassifier;
use crate::error::CapabilityError;

/// Orientation classifier shelling out to `tesseract --psm 0`.
pub struct TesseractOsd;

impl TesseractOsd {
    pub fn new() -> Self {
        Self
    }

    fn run_osd(&self, image_path: &Path) -> Result<String, CapabilityError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["--psm", "0"])
            .output();

        match output {
            Ok(output) => {
                // OSD details land on stderr in some builds, stdout in
                // others; parse both.
                let mut text = String::from_utf8_lossy(&output.stdout).to_string();
                text.push('\n');
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                if output.status.success() {
                    Ok(text)
                } else {
                    Err(CapabilityError::ExecutionFailed(format!(
                        "tesseract OSD failed: {}",
                        String::from_utf8_lossy(&output.stderr).trim()
                    )))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CapabilityError::ToolNotFound(
                    "tesseract (install tesseract-ocr)".to_string(),
                ))
            }
            Err(e) => Err(CapabilityError::Io(e)),
        }
    }
}

impl Default for TesseractOsd {
    fn default() -> Self {
        Self::new()
    }
}

impl OrientationClassifier for TesseractOsd {
    fn classify(&self, image: &GrayImage) -> Result<(u16, f32), CapabilityError> {
        let temp_dir = TempDir::new()?;
        let image_path = temp_dir.path().join("osd.png");
        image
            .save(&image_path)
            .map_err(|e| CapabilityError::ExecutionFailed(format!("cannot save OSD input: {}", e)))?;

        let output = self.run_osd(&image_path)?;
        parse_osd_output(&output)
    }
}

/// Parse the `Rotate:` and `Orientation confidence:` lines of OSD output.
pub fn parse_osd_output(output: &str) -> Result<(u16, f32), CapabilityError> {
    let mut rotate: Option<u16> = None;
    let mut confidence: Option<f32> = None;

    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Rotate:") {
            rotate = rest.trim().parse().ok();
        } else if let Some(rest) = line.strip_prefix("Orientation confidence:") {
            confidence = rest.trim().parse().ok();
        }
    }

    match rotate {
        Some(rotate) if matches!(rotate, 0 | 90 | 180 | 270) => {
            Ok((rotate, confidence.unwrap_or(0.0)))
        }
        Some(other) => Err(CapabilityError::OutputUnparseable(format!(
            "unexpected OSD rotation {}",
            other
        ))),
        None => Err(CapabilityError::OutputUnparseable(
            "OSD output has no Rotate line".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OSD_OUTPUT: &str = "\
Page number: 0
Orientation in degrees: 270
Rotate: 90
Orientation confidence: 9.51
Script: Latin
Script confidence: 2.11
";

    #[test]
    fn parses_rotation_and_confidence() {
        let (rotate, conf) = parse_osd_output(OSD_OUTPUT).unwrap();
        assert_eq!(rotate, 90);
        assert!((conf - 9.51).abs() < 0.001);
    }

    #[test]
    fn missing_rotate_line_is_unparseable() {
        let err = parse_osd_output("Script: Latin\n").unwrap_err();
        assert!(matches!(err, CapabilityError::OutputUnparseable(_)));
    }

    #[test]
    fn unexpected_rotation_value_rejected() {
        let err = parse_osd_output("Rotate: 45\nOrientation confidence: 3.0\n").unwrap_err();
        assert!(matches!(err, CapabilityError::OutputUnparseable(_)));
    }

    #[test]
    fn missing_confidence_defaults_to_zero() {
        let (rotate, conf) = parse_osd_output("Rotate: 180\n").unwrap();
        assert_eq!(rotate, 180);
        assert_eq!(conf, 0.0);
    }
}
