//! Decide whether the faces on two images belong to the same person.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::types::compare_faces;
use image::RgbImage;
use std::fmt;
use thiserror::Error;

/// Which of the two compared images an outcome refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// The identity-document photo, used as the baseline.
    Cnic,
    /// The candidate photo.
    Profile,
}

impl Subject {
    /// Human-readable name of the picture itself.
    pub fn picture_name(self) -> &'static str {
        match self {
            Subject::Cnic => "CNIC Card",
            Subject::Profile => "Profile Picture",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Subject::Cnic => "CNIC",
            Subject::Profile => "Profile",
        })
    }
}

#[derive(Error, Debug)]
pub enum CompareError {
    #[error("{subject} image could not be decoded: {source}")]
    InvalidImage {
        subject: Subject,
        #[source]
        source: image::ImageError,
    },
    #[error("Face not found on {}.", .0.picture_name())]
    NoFace(Subject),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
}

/// Decode raw bytes of any format supported by `image` into RGB pixels.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Compare the first face of `cnic` against the first face of `profile`.
///
/// Both images are decoded before any detection runs. Failures are reported
/// for the CNIC image before the profile image.
pub fn compare_images<A: FaceAnalyzer + ?Sized>(
    analyzer: &mut A,
    cnic: &[u8],
    profile: &[u8],
) -> Result<bool, CompareError> {
    let decode = |subject, bytes: &[u8]| {
        decode_image(bytes).map_err(|source| CompareError::InvalidImage { subject, source })
    };
    let cnic_image = decode(Subject::Cnic, cnic)?;
    let profile_image = decode(Subject::Profile, profile)?;

    let cnic_encoding = analyzer
        .face_encodings(&cnic_image)?
        .into_iter()
        .next()
        .ok_or(CompareError::NoFace(Subject::Cnic))?;
    let profile_encoding = analyzer
        .face_encodings(&profile_image)?
        .into_iter()
        .next()
        .ok_or(CompareError::NoFace(Subject::Profile))?;

    let matched = compare_faces(&[cnic_encoding], &profile_encoding)
        .first()
        .copied()
        .unwrap_or(false);

    tracing::debug!(matched, "face comparison finished");
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embedding;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    /// Treats the red channel of pixel (0, 0) as identity; 0 means "no face".
    #[derive(Default)]
    struct ColorAnalyzer {
        calls: usize,
    }

    impl FaceAnalyzer for ColorAnalyzer {
        fn face_encodings(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, AnalyzerError> {
            self.calls += 1;
            let id = image.get_pixel(0, 0)[0] as usize;
            if id == 0 {
                return Ok(Vec::new());
            }
            let mut values = vec![0.0; 256];
            values[id] = 1.0;
            Ok(vec![Embedding::new(values)])
        }
    }

    fn png(red: u8) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbImage::from_pixel(4, 4, Rgb([red, 10, 10]))
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn test_same_identity_matches() {
        let mut analyzer = ColorAnalyzer::default();
        assert!(compare_images(&mut analyzer, &png(7), &png(7)).unwrap());
    }

    #[test]
    fn test_different_identity_does_not_match() {
        let mut analyzer = ColorAnalyzer::default();
        assert!(!compare_images(&mut analyzer, &png(7), &png(9)).unwrap());
    }

    #[test]
    fn test_no_face_on_cnic_wins_over_profile() {
        let mut analyzer = ColorAnalyzer::default();
        let err = compare_images(&mut analyzer, &png(0), &png(0)).unwrap_err();
        assert!(matches!(err, CompareError::NoFace(Subject::Cnic)));
        assert_eq!(err.to_string(), "Face not found on CNIC Card.");
        assert_eq!(analyzer.calls, 1);
    }

    #[test]
    fn test_no_face_on_profile() {
        let mut analyzer = ColorAnalyzer::default();
        let err = compare_images(&mut analyzer, &png(3), &png(0)).unwrap_err();
        assert_eq!(err.to_string(), "Face not found on Profile Picture.");
    }

    #[test]
    fn test_undecodable_profile_reported_before_detection() {
        let mut analyzer = ColorAnalyzer::default();
        let err = compare_images(&mut analyzer, &png(0), b"not an image").unwrap_err();
        assert!(matches!(err, CompareError::InvalidImage { subject: Subject::Profile, .. }));
        assert_eq!(analyzer.calls, 0);
    }

    #[test]
    fn test_repeated_comparisons_agree() {
        let mut analyzer = ColorAnalyzer::default();
        let first = compare_images(&mut analyzer, &png(5), &png(6)).unwrap();
        let second = compare_images(&mut analyzer, &png(5), &png(6)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_decode_image_converts_to_rgb() {
        let mut out = Cursor::new(Vec::new());
        image::GrayImage::from_pixel(3, 2, image::Luma([90]))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        let rgb = decode_image(&out.into_inner()).unwrap();
        assert_eq!(rgb.dimensions(), (3, 2));
        assert_eq!(rgb.get_pixel(1, 1), &Rgb([90, 90, 90]));
    }
}
