use std::collections::HashMap;

use tracing::debug;

use crate::compile::UniformLayout;
use crate::error::ShaderError;

/// Value types the uniform block can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec2,
    Int,
    IVec2,
}

impl UniformKind {
    pub fn size(self) -> u32 {
        match self {
            UniformKind::Float | UniformKind::Int => 4,
            UniformKind::Vec2 | UniformKind::IVec2 => 8,
        }
    }
}

/// Where a named uniform lives inside the program's block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub offset: u32,
    pub kind: UniformKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Int(i32),
    IVec2([i32; 2]),
    /// Stored as a 32-bit integer, `0` or `1`.
    Bool(bool),
}

impl UniformValue {
    fn kind(self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Int(_) | UniformValue::Bool(_) => UniformKind::Int,
            UniformValue::IVec2(_) => UniformKind::IVec2,
        }
    }

    fn write(self, dst: &mut [u8]) {
        match self {
            UniformValue::Float(v) => dst.copy_from_slice(bytemuck::bytes_of(&v)),
            UniformValue::Vec2(v) => dst.copy_from_slice(bytemuck::bytes_of(&v)),
            UniformValue::Int(v) => dst.copy_from_slice(bytemuck::bytes_of(&v)),
            UniformValue::IVec2(v) => dst.copy_from_slice(bytemuck::bytes_of(&v)),
            UniformValue::Bool(v) => dst.copy_from_slice(bytemuck::bytes_of(&i32::from(v))),
        }
    }
}

/// Uniform-location table of one linked program.
///
/// Tables are tied to the generation of the program they were resolved from;
/// a relink may move uniforms even when the names are unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformLocations {
    generation: u64,
    block_size: u32,
    slots: HashMap<String, UniformSlot>,
}

impl UniformLocations {
    pub fn new(generation: u64, block_size: u32, slots: HashMap<String, UniformSlot>) -> Self {
        Self {
            generation,
            block_size,
            slots,
        }
    }

    pub fn from_layout(generation: u64, layout: &UniformLayout) -> Self {
        Self::new(generation, layout.block_size, layout.slots.clone())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Size of the backing block in bytes, rounded up to 16.
    pub fn block_size(&self) -> u32 {
        self.block_size.max(16).div_ceil(16) * 16
    }

    pub fn get(&self, name: &str) -> Option<UniformSlot> {
        self.slots.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Immutable per-frame snapshot handed to the active program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderUniforms {
    /// Elapsed, pause-adjusted time in seconds.
    pub time: f32,
    /// Viewport size in pixels.
    pub resolution: [f32; 2],
    /// Last pointer position in pixels, origin at the bottom-left.
    pub mouse: [f32; 2],
    pub mouse_down: bool,
    /// Grid columns and rows, each at least one.
    pub grid: [i32; 2],
    pub paused: bool,
    pub frame: i32,
    pub seed: i32,
}

impl RenderUniforms {
    pub const NAMES: [&'static str; 8] = [
        "iTime",
        "iResolution",
        "iMouse",
        "iMouseDown",
        "iGrid",
        "iPaused",
        "iFrame",
        "iSeed",
    ];

    pub fn named_values(&self) -> [(&'static str, UniformValue); 8] {
        [
            ("iTime", UniformValue::Float(self.time)),
            ("iResolution", UniformValue::Vec2(self.resolution)),
            ("iMouse", UniformValue::Vec2(self.mouse)),
            ("iMouseDown", UniformValue::Bool(self.mouse_down)),
            ("iGrid", UniformValue::IVec2(self.grid)),
            ("iPaused", UniformValue::Bool(self.paused)),
            ("iFrame", UniformValue::Int(self.frame)),
            ("iSeed", UniformValue::Int(self.seed)),
        ]
    }
}

/// Writes uniform snapshots into a CPU-side block laid out by the active
/// program's location table.
///
/// Names missing from the table are optional bindings: the write is skipped
/// and reported once per program generation.
#[derive(Debug, Default)]
pub struct UniformBinder {
    block: Vec<u8>,
    generation: Option<u64>,
    skipped: Vec<ShaderError>,
}

impl UniformBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lays out `snapshot` according to `locations` and returns the block bytes.
    pub fn bind(&mut self, locations: &UniformLocations, snapshot: &RenderUniforms) -> &[u8] {
        let fresh_generation = self.generation != Some(locations.generation());
        if fresh_generation {
            self.generation = Some(locations.generation());
            self.block.clear();
            self.block.resize(locations.block_size() as usize, 0);
        }

        self.skipped.clear();
        for (name, value) in snapshot.named_values() {
            let Some(slot) = locations.get(name) else {
                self.skipped.push(ShaderError::UniformMissing { name });
                continue;
            };
            let start = slot.offset as usize;
            let end = start + slot.kind.size() as usize;
            if slot.kind != value.kind() || end > self.block.len() {
                self.skipped.push(ShaderError::UniformMissing { name });
                continue;
            }
            value.write(&mut self.block[start..end]);
        }

        if fresh_generation {
            for skipped in &self.skipped {
                debug!(generation = locations.generation(), "{skipped}; binding skipped");
            }
        }

        &self.block
    }

    /// Bindings skipped by the most recent [`bind`](Self::bind).
    pub fn skipped(&self) -> &[ShaderError] {
        &self.skipped
    }

    /// Generation of the location table the block was last laid out for.
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> RenderUniforms {
        RenderUniforms {
            time: 2.5,
            resolution: [1280.0, 720.0],
            mouse: [10.0, 700.0],
            mouse_down: true,
            grid: [4, 3],
            paused: false,
            frame: 42,
            seed: 1337,
        }
    }

    fn full_table(generation: u64) -> UniformLocations {
        let slots = [
            ("iResolution", 0, UniformKind::Vec2),
            ("iMouse", 8, UniformKind::Vec2),
            ("iGrid", 16, UniformKind::IVec2),
            ("iTime", 24, UniformKind::Float),
            ("iFrame", 28, UniformKind::Int),
            ("iSeed", 32, UniformKind::Int),
            ("iPaused", 36, UniformKind::Int),
            ("iMouseDown", 40, UniformKind::Int),
        ]
        .into_iter()
        .map(|(name, offset, kind)| (name.to_string(), UniformSlot { offset, kind }))
        .collect();
        UniformLocations::new(generation, 44, slots)
    }

    fn read_f32(block: &[u8], offset: usize) -> f32 {
        bytemuck::pod_read_unaligned(&block[offset..offset + 4])
    }

    fn read_i32(block: &[u8], offset: usize) -> i32 {
        bytemuck::pod_read_unaligned(&block[offset..offset + 4])
    }

    #[test]
    fn block_size_rounds_up_to_sixteen() {
        assert_eq!(full_table(1).block_size(), 48);
        assert_eq!(UniformLocations::default().block_size(), 16);
    }

    #[test]
    fn writes_each_value_at_its_offset() {
        let mut binder = UniformBinder::new();
        let block = binder.bind(&full_table(1), &snapshot()).to_vec();
        assert_eq!(block.len(), 48);
        assert_eq!(read_f32(&block, 0), 1280.0);
        assert_eq!(read_f32(&block, 4), 720.0);
        assert_eq!(read_f32(&block, 12), 700.0);
        assert_eq!(read_i32(&block, 16), 4);
        assert_eq!(read_i32(&block, 20), 3);
        assert_eq!(read_f32(&block, 24), 2.5);
        assert_eq!(read_i32(&block, 28), 42);
        assert_eq!(read_i32(&block, 32), 1337);
        assert_eq!(read_i32(&block, 36), 0);
        assert_eq!(read_i32(&block, 40), 1);
        assert!(binder.skipped().is_empty());
    }

    #[test]
    fn missing_uniforms_are_skipped_not_fatal() {
        let mut slots = HashMap::new();
        slots.insert(
            "iTime".to_string(),
            UniformSlot {
                offset: 0,
                kind: UniformKind::Float,
            },
        );
        let table = UniformLocations::new(7, 4, slots);
        let mut binder = UniformBinder::new();
        let block = binder.bind(&table, &snapshot()).to_vec();
        assert_eq!(read_f32(&block, 0), 2.5);
        let skipped: Vec<_> = binder
            .skipped()
            .iter()
            .map(|err| match err {
                ShaderError::UniformMissing { name } => *name,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(skipped.len(), RenderUniforms::NAMES.len() - 1);
        assert!(!skipped.contains(&"iTime"));
    }

    #[test]
    fn mismatched_kind_is_treated_as_missing() {
        let mut slots = HashMap::new();
        slots.insert(
            "iFrame".to_string(),
            UniformSlot {
                offset: 0,
                kind: UniformKind::Vec2,
            },
        );
        let mut binder = UniformBinder::new();
        let block = binder.bind(&UniformLocations::new(1, 16, slots), &snapshot()).to_vec();
        assert!(block.iter().all(|byte| *byte == 0));
        assert!(binder
            .skipped()
            .iter()
            .any(|err| matches!(err, ShaderError::UniformMissing { name: "iFrame" })));
    }

    #[test]
    fn identical_tables_bind_identically() {
        let mut first = UniformBinder::new();
        let mut second = UniformBinder::new();
        let a = first.bind(&full_table(1), &snapshot()).to_vec();
        let b = second.bind(&full_table(2), &snapshot()).to_vec();
        assert_eq!(a, b);
    }

    #[test]
    fn new_generation_relays_out_the_block() {
        let mut binder = UniformBinder::new();
        binder.bind(&full_table(1), &snapshot());
        assert_eq!(binder.generation(), Some(1));

        let mut slots = HashMap::new();
        slots.insert(
            "iTime".to_string(),
            UniformSlot {
                offset: 16,
                kind: UniformKind::Float,
            },
        );
        let moved = UniformLocations::new(2, 20, slots);
        let block = binder.bind(&moved, &snapshot()).to_vec();
        assert_eq!(binder.generation(), Some(2));
        assert_eq!(block.len(), 32);
        assert_eq!(read_f32(&block, 16), 2.5);
        assert_eq!(read_f32(&block, 0), 0.0);
    }
}
