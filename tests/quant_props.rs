//! Property tests for the quantized codecs and the vertex welder.

use glam::Vec3;
use proptest::prelude::*;
use vesper_assets::VertexWelder;
use vesper_assets::quant::{
    PackedNormal, quat_fixed32, quat_fixed48, quat_interval32, vec3_fixed32, vec3_fixed48,
    vec3_interval32,
};

proptest! {
    #[test]
    fn fixed48_never_escapes_unit_range(x: u16, y: u16, z: u16) {
        let v = vec3_fixed48([x, y, z]);
        for c in v.to_array() {
            prop_assert!((-1.0..=1.0).contains(&c));
        }
    }

    #[test]
    fn fixed32_never_escapes_unit_range(word: u32) {
        let v = vec3_fixed32(word);
        for c in v.to_array() {
            prop_assert!((-1.0..=1.0).contains(&c));
        }
    }

    #[test]
    fn interval_lands_in_declared_interval(
        word: u32,
        min in prop::array::uniform3(-1000.0f32..1000.0),
        range in prop::array::uniform3(0.0f32..1000.0),
    ) {
        let min = Vec3::from_array(min);
        let range = Vec3::from_array(range);
        let v = vec3_interval32(word, min, range);
        for i in 0..3 {
            prop_assert!(v[i] >= min[i] - 1e-3);
            prop_assert!(v[i] <= min[i] + range[i] + 1e-3);
        }
    }

    #[test]
    fn interval_with_zero_range_pins_to_min(
        word: u32,
        min in prop::array::uniform3(-100.0f32..100.0),
    ) {
        let min = Vec3::from_array(min);
        let v = vec3_interval32(word, min, Vec3::ZERO);
        prop_assert_eq!(v, min);
    }

    #[test]
    fn fixed_point_quats_are_near_unit(x: u16, y: u16, z: u16, word: u32) {
        // valid encoders only emit vector parts inside the unit ball; for
        // those the reconstructed W makes the norm exactly 1. Bit patterns
        // outside it (possible under corruption) clamp W to zero instead of
        // taking an undefined sqrt.
        for q in [quat_fixed48([x, y, z]), quat_fixed32(word)] {
            let vlen_sq = q.x * q.x + q.y * q.y + q.z * q.z;
            if vlen_sq <= 1.0 {
                prop_assert!((q.length() - 1.0).abs() < 1e-4);
            } else {
                prop_assert_eq!(q.w, 0.0);
            }
        }
    }

    #[test]
    fn interval_quats_with_unit_interval_are_near_unit(word: u32) {
        // a (min, range) pair spanning [-1, 1] mirrors the fixed-point case
        let q = quat_interval32(word, Vec3::splat(-1.0), Vec3::splat(2.0));
        let vlen_sq = q.x * q.x + q.y * q.y + q.z * q.z;
        if vlen_sq <= 1.0 {
            prop_assert!((q.length() - 1.0).abs() < 1e-3);
        } else {
            prop_assert_eq!(q.w, 0.0);
        }
    }

    #[test]
    fn welder_dedup_idempotence(
        pos in prop::array::uniform3(0.0f32..10.0),
        normal: u32,
        extra: u32,
        repeats in 1usize..20,
    ) {
        let pos = Vec3::from_array(pos);
        let mut w = VertexWelder::new(Vec3::ZERO, Vec3::splat(10.0), repeats);
        let first = w.add(pos, PackedNormal(normal), extra);
        for _ in 1..repeats {
            prop_assert_eq!(w.add(pos, PackedNormal(normal), extra), first);
        }
        prop_assert_eq!(w.num_verts(), 1);
        prop_assert_eq!(w.num_wedges(), repeats);
    }

    #[test]
    fn welder_wedge_map_roundtrip(
        points in prop::collection::vec(prop::array::uniform3(0.0f32..4.0), 1..64),
    ) {
        let wedges: Vec<Vec3> = points.into_iter().map(Vec3::from_array).collect();
        let mut w = VertexWelder::from_positions(wedges.iter(), wedges.len());
        for p in &wedges {
            w.add(*p, PackedNormal(0), 0);
        }
        // every wedge's id resolves back to a vertex with its position
        for (i, p) in wedges.iter().enumerate() {
            let vert = w.wedge_to_vert()[i] as usize;
            prop_assert_eq!(w.point(vert), *p);
        }
    }
}
