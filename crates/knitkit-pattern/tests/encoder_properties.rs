use knitkit_core::{Alignment, NeedleRange, LINE_BYTES};
use knitkit_pattern::{KnitImage, LineEncoder};
use proptest::prelude::*;

fn arb_image() -> impl Strategy<Value = KnitImage> {
    (1u32..24, 1u32..12, 1u8..=6).prop_flat_map(|(width, height, colors)| {
        proptest::collection::vec(0..colors, (width * height) as usize).prop_map(move |pixels| {
            KnitImage::from_indices(width, height, colors, pixels).unwrap()
        })
    })
}

fn arb_alignment() -> impl Strategy<Value = Alignment> {
    prop_oneof![
        Just(Alignment::Center),
        Just(Alignment::Left),
        Just(Alignment::Right),
    ]
}

proptest! {
    #[test]
    fn color_band_is_always_in_range(intensity in any::<u8>(), colors in 1u8..=6) {
        prop_assert!(KnitImage::color_band(intensity, colors) < colors);
    }

    #[test]
    fn color_band_is_monotonic(a in any::<u8>(), b in any::<u8>(), colors in 1u8..=6) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(KnitImage::color_band(low, colors) <= KnitImage::color_band(high, colors));
    }

    #[test]
    fn every_needle_is_knitted_by_exactly_one_pass_per_row(
        image in arb_image(),
        start in 0i32..100,
        alignment in arb_alignment(),
    ) {
        let range = NeedleRange::new(start, start + 40)
            .unwrap()
            .placed(image.width(), alignment)
            .unwrap();
        let encoder = LineEncoder::new(image.clone(), range).unwrap();

        for row in 0..image.height() {
            let lines: Vec<_> = encoder
                .passes_from(row)
                .take_while(|(r, _, _)| *r == row)
                .map(|(_, _, line)| line)
                .collect();

            for n in 0..range.knit_width() as usize {
                let needle = range.knit_start() as i32 + n as i32;
                let hits = lines.iter().filter(|line| line.is_set(n)).count();
                let expected = usize::from(range.in_image(needle));
                prop_assert_eq!(hits, expected);
            }
        }
    }

    #[test]
    fn encoding_is_deterministic(image in arb_image()) {
        let range = NeedleRange::full_bed()
            .placed(image.width(), Alignment::Center)
            .unwrap();
        let encoder = LineEncoder::new(image, range).unwrap();

        let first: Vec<_> = encoder.passes().collect();
        let second: Vec<_> = encoder.passes().collect();
        prop_assert_eq!(first.len(), encoder.pass_count());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn wire_bytes_match_bits(image in arb_image(), start in 0i32..150) {
        let range = NeedleRange::new(start, start + 40)
            .unwrap()
            .placed(image.width(), Alignment::Left)
            .unwrap();
        let encoder = LineEncoder::new(image, range).unwrap();

        for (_, _, line) in encoder.passes() {
            let bytes = line.to_wire_bytes();
            prop_assert_eq!(bytes.len(), LINE_BYTES);
            let set: u32 = bytes.iter().map(|b| b.count_ones()).sum();
            prop_assert_eq!(set as usize, line.active_count());
            for n in 0..line.bits().len() {
                let needle = start as usize + n;
                let bit = bytes[needle / 8] & (1 << (needle % 8)) != 0;
                prop_assert_eq!(bit, line.is_set(n));
            }
        }
    }
}

#[test]
fn open_reads_png_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stripes.png");
    let gray = image::GrayImage::from_raw(4, 2, vec![0, 255, 0, 255, 255, 255, 255, 255]).unwrap();
    gray.save(&path).unwrap();

    let image = KnitImage::open(&path, 2).unwrap();
    assert_eq!((image.width(), image.height()), (4, 2));
    assert_eq!(image.row(0), Some(&[0, 1, 0, 1][..]));
    assert_eq!(image.colors_in_row(1), vec![1]);
}
