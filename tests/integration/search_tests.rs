use image::{imageops, GrayImage, Luma};
use similar_images::decode::ImageDecoder;
use similar_images::hash::{Fingerprint, Symmetry};
use similar_images::progress::NoProgress;
use similar_images::search::{rank, SimilarityIndex};
use similar_images::trawler::{ImageRecord, Trawler, TrawlerConfig};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn pattern() -> GrayImage {
    GrayImage::from_fn(90, 90, |x, y| {
        let (bx, by) = (x / 10, y / 10);
        Luma([((bx * 29 + by * 67 + bx * bx * 7) % 200 + 30) as u8])
    })
}

fn trawl(root: &Path) -> Vec<ImageRecord> {
    Trawler::new(TrawlerConfig::default(), ImageDecoder::new())
        .start(root, &NoProgress)
        .unwrap()
        .records
}

fn fingerprint_of(records: &[ImageRecord], name: &str) -> Fingerprint {
    records
        .iter()
        .find(|r| r.path.ends_with(name))
        .map(|r| r.fingerprint)
        .unwrap()
}

#[test]
fn test_find_rotated_copy_end_to_end() {
    let dir = tempdir().unwrap();
    let original = pattern();
    original.save(dir.path().join("original.png")).unwrap();
    imageops::rotate180(&original)
        .save(dir.path().join("upside-down.png"))
        .unwrap();
    let mut inverted = original.clone();
    imageops::invert(&mut inverted);
    inverted.save(dir.path().join("negative.png")).unwrap();

    let records = trawl(dir.path());
    assert_eq!(records.len(), 3);
    let needle = fingerprint_of(&records, "original.png");

    let index = SimilarityIndex::from_records(records.clone(), true);
    let matches = index.find(needle, 90);
    let names: Vec<_> = matches
        .iter()
        .map(|m| m.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    assert_eq!(names[0], "original.png");
    assert_eq!(matches[0].similarity, 100);
    assert!(names.contains(&"upside-down.png".to_string()));
    assert!(!names.contains(&"negative.png".to_string()));

    assert_eq!(index.find(needle, 90), rank(needle, &records, true, 90));
}

#[test]
fn test_symmetry_can_be_disabled() {
    let needle = Fingerprint::from_bits(0x0123_4567_89ab_cdef);
    let rotated = needle.transform(Symmetry::Rotate270);
    assert_ne!(needle, rotated);

    let records = vec![ImageRecord {
        path: PathBuf::from("/photos/rotated.png"),
        fingerprint: rotated,
        version: 2,
    }];

    let with = SimilarityIndex::from_records(records.clone(), true).find(needle, 100);
    assert_eq!(with.len(), 1);
    assert_ne!(with[0].symmetry, Symmetry::Identity);
    assert_eq!(with[0].distance, 0);

    let without = SimilarityIndex::from_records(records, false).find(needle, 0);
    assert_eq!(without.len(), 1);
    assert_eq!(without[0].symmetry, Symmetry::Identity);
    assert_eq!(without[0].distance, needle.distance(rotated));
}

#[test]
fn test_equal_scores_are_ordered_by_path() {
    let fp = Fingerprint::from_bits(42);
    let records: Vec<ImageRecord> = ["/c.png", "/a.png", "/b.png"]
        .iter()
        .map(|p| ImageRecord {
            path: PathBuf::from(p),
            fingerprint: fp,
            version: 2,
        })
        .collect();

    let index = SimilarityIndex::from_records(records, true);
    assert_eq!(index.len(), 3);
    let paths: Vec<_> = index.find(fp, 100).into_iter().map(|m| m.path).collect();
    assert_eq!(
        paths,
        vec![
            PathBuf::from("/a.png"),
            PathBuf::from("/b.png"),
            PathBuf::from("/c.png")
        ]
    );
}
