mod common;

use std::sync::Mutex;

use common::{Lcg, PaintBus};
use vibe_go_core::dispatch::{DispatchConfig, Dispatcher};
use vibe_go_core::scale::{ScaleParams, Screen};
use vibe_go_core::{DiffOptions, Frame};

const SOURCES: [(usize, usize); 5] = [(160, 144), (256, 224), (256, 240), (100, 100), (400, 300)];

#[test]
fn unit_scale_maps_every_index_to_itself() {
    let params = ScaleParams::identity(Screen::ILI9341, 160, 144);
    for (left, top, w, h) in [(0, 0, 160, 144), (13, 7, 40, 1), (159, 143, 1, 1)] {
        let rect = params.dest_rect(left, top, w, h);
        assert_eq!((rect.x, rect.y), (left as u32, top as u32));
        assert_eq!((rect.width, rect.height), (w as u32, h as u32));

        let cols: Vec<usize> = params.columns(&rect, left).take(w).collect();
        assert_eq!(cols, (left..left + w).collect::<Vec<_>>());
        let rows: Vec<usize> = params.rows(&rect, top).take(h).collect();
        assert_eq!(rows, (top..top + h).collect::<Vec<_>>());
    }
}

/// Split `0..len` into consecutive segments at pseudo-random cut points.
fn segments(len: usize, seed: u32) -> Vec<(usize, usize)> {
    let mut rng = Lcg::new(seed);
    let mut out = Vec::new();
    let mut start = 0;
    while start < len {
        let width = (1 + rng.below(24)).min(len - start);
        out.push((start, width));
        start += width;
    }
    out
}

#[test]
fn adjacent_regions_tile_the_destination() {
    for (seed, &(w, h)) in SOURCES.iter().enumerate() {
        let params = ScaleParams::fit(Screen::ILI9341, w, h, 1.0);
        let whole = params.dest_rect(0, 0, w, h);

        let mut next_x = 0;
        for (left, width) in segments(w, seed as u32) {
            let rect = params.dest_rect(left, 0, width, 1);
            assert_eq!(rect.x, next_x, "{w}x{h}: gap or overlap at column {left}");
            next_x = rect.x + rect.width;
        }
        assert_eq!(next_x, whole.width);

        let mut next_y = 0;
        for (top, height) in segments(h, 50 + seed as u32) {
            let rect = params.dest_rect(0, top, 1, height);
            assert_eq!(rect.y, next_y, "{w}x{h}: gap or overlap at row {top}");
            next_y = rect.y + rect.height;
        }
        assert_eq!(next_y, whole.height);
    }
}

#[test]
fn upscaled_regions_sample_like_the_whole_frame() {
    let params = ScaleParams::fit(Screen::ILI9341, 160, 144, 1.0);
    let whole = params.dest_rect(0, 0, 160, 144);
    let global: Vec<usize> = params.columns(&whole, 0).take(whole.width as usize).collect();

    for (left, width) in segments(160, 9) {
        let rect = params.dest_rect(left, 0, width, 1);
        let cols: Vec<usize> = params.columns(&rect, left).take(rect.width as usize).collect();
        let start = rect.x as usize;
        assert_eq!(cols, global[start..start + cols.len()]);
        assert!(cols.iter().all(|&c| c >= left && c < left + width));
    }
}

#[test]
fn full_frame_produces_exactly_target_area() {
    for &(w, h) in &SOURCES {
        let params = ScaleParams::fit(Screen::ILI9341, w, h, 1.0);
        let target = params.dest_rect(0, 0, w, h);

        let bus = Mutex::new(PaintBus::ili9341());
        let frame = Frame::<u16>::new(w, h).unwrap();
        let mut dispatcher = Dispatcher::new(DispatchConfig::default());
        dispatcher
            .write_frame(&bus, &frame, None, None, DiffOptions::direct(), &params)
            .unwrap();

        let bus = bus.lock().unwrap();
        assert_eq!(bus.pixels_written, (target.width * target.height) as usize, "{w}x{h}");
    }
}
