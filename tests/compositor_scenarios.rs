mod common;

use common::{decode, solid_png, PALETTE};
use image::Rgba;
use rfcapture::compositor::merge;
use rfcapture::MergeError;

#[test]
fn three_bands_land_on_expected_rows() {
    let images: Vec<_> = (0..3).map(|i| solid_png(1000, 800, PALETTE[i])).collect();
    let out = merge(&images, &[800, 800, 300]).unwrap();
    let img = decode(&out);

    assert_eq!(img.dimensions(), (1000, 1900));
    for (band, rows) in [(0usize, 0u32..800u32), (1, 800..1600), (2, 1600..1900)] {
        for y in [rows.start, rows.end - 1] {
            assert_eq!(img.get_pixel(0, y), &Rgba(PALETTE[band]), "row {}", y);
            assert_eq!(img.get_pixel(999, y), &Rgba(PALETTE[band]), "row {}", y);
        }
    }
}

#[test]
fn width_is_widest_section_and_height_is_sum_of_crops() {
    let images = vec![
        solid_png(300, 120, PALETTE[0]),
        solid_png(420, 120, PALETTE[1]),
        solid_png(360, 120, PALETTE[2]),
    ];
    let heights = [120, 90, 15];
    let img = decode(&merge(&images, &heights).unwrap());

    assert_eq!(img.width(), 420);
    assert_eq!(img.height(), heights.iter().sum::<u32>());
    assert!(img.height() <= 3 * 120);
}

#[test]
fn mismatched_heights_fall_back_to_natural_heights() {
    let images = vec![solid_png(64, 40, PALETTE[0]), solid_png(64, 24, PALETTE[3])];
    let img = decode(&merge(&images, &[10, 10, 10]).unwrap());
    assert_eq!(img.dimensions(), (64, 64));
    assert_eq!(img.get_pixel(0, 39), &Rgba(PALETTE[0]));
    assert_eq!(img.get_pixel(0, 40), &Rgba(PALETTE[3]));

    let no_heights = decode(&merge(&images, &[]).unwrap());
    assert_eq!(no_heights.dimensions(), (64, 64));
}

#[test]
fn caller_order_is_authoritative() {
    let images = vec![solid_png(8, 8, PALETTE[2]), solid_png(8, 8, PALETTE[0])];
    let img = decode(&merge(&images, &[8, 8]).unwrap());
    assert_eq!(img.get_pixel(0, 0), &Rgba(PALETTE[2]));
    assert_eq!(img.get_pixel(0, 15), &Rgba(PALETTE[0]));
}

#[test]
fn runaway_height_is_rejected_before_allocating() {
    let images = vec![solid_png(1280, 720, PALETTE[0])];
    match merge(&images, &[u32::MAX]) {
        Err(MergeError::InvalidDimensions { width, height }) => {
            assert_eq!((width, height), (1280, u32::MAX as u64));
        }
        other => panic!("expected InvalidDimensions, got {:?}", other),
    }
}

#[test]
fn empty_section_list_is_rejected() {
    assert_eq!(merge(&[], &[]), Err(MergeError::NoImages));
}

#[test]
fn identical_input_gives_identical_output() {
    let images = vec![solid_png(33, 17, PALETTE[1]), solid_png(31, 17, PALETTE[2])];
    let a = merge(&images, &[17, 9]).unwrap();
    let b = merge(&images, &[17, 9]).unwrap();
    assert_eq!(a, b);
}
