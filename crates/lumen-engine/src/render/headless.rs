use std::collections::HashMap;

use crate::coords::ColorRgba;
use crate::error::GpuError;

use super::gpu::validate_rgba8;
use super::{
    FrameUniforms, GpuContext, GpuProgram, GpuTexture, InstanceUniforms, LineSegment, ProgramLayout,
    ProgramSource,
};

/// A compiled program as seen by [`HeadlessGpu`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedProgram {
    pub vertex: String,
    pub fragment: String,
    pub layout: ProgramLayout,
}

/// One recorded `issue_draw` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub program: GpuProgram,
    pub frame: FrameUniforms,
    pub instances: Vec<InstanceUniforms>,
}

/// One recorded `draw_lines` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedLines {
    pub view_projection: [[f32; 4]; 4],
    pub segments: Vec<LineSegment>,
}

/// [`GpuContext`] without a device.
///
/// Validates handles the way a real backend would and records every call,
/// which makes renderer behavior observable in tests and headless tools.
#[derive(Debug, Default)]
pub struct HeadlessGpu {
    next_program: u32,
    next_texture: u32,

    programs: HashMap<GpuProgram, RecordedProgram>,
    textures: HashMap<GpuTexture, (u32, u32)>,

    pub compile_calls: usize,
    pub upload_calls: usize,
    pub released_programs: Vec<GpuProgram>,
    pub released_textures: Vec<GpuTexture>,
    pub clears: Vec<(ColorRgba, f32)>,
    pub draws: Vec<RecordedDraw>,
    pub lines: Vec<RecordedLines>,
}

impl HeadlessGpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn program(&self, program: GpuProgram) -> Option<&RecordedProgram> {
        self.programs.get(&program)
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_size(&self, texture: GpuTexture) -> Option<(u32, u32)> {
        self.textures.get(&texture).copied()
    }

    /// Forgets recorded clears and draws, keeping live resources.
    pub fn reset_frame(&mut self) {
        self.clears.clear();
        self.draws.clear();
        self.lines.clear();
    }
}

impl GpuContext for HeadlessGpu {
    fn compile(
        &mut self,
        source: &ProgramSource<'_>,
        layout: &ProgramLayout,
    ) -> Result<GpuProgram, GpuError> {
        self.compile_calls += 1;
        if source.vertex.trim().is_empty() || source.fragment.trim().is_empty() {
            return Err(GpuError::Compile("empty shader stage".into()));
        }

        self.next_program += 1;
        let handle = GpuProgram(self.next_program);
        self.programs.insert(
            handle,
            RecordedProgram {
                vertex: source.vertex.to_owned(),
                fragment: source.fragment.to_owned(),
                layout: layout.clone(),
            },
        );
        Ok(handle)
    }

    fn release_program(&mut self, program: GpuProgram) {
        if self.programs.remove(&program).is_some() {
            self.released_programs.push(program);
        }
    }

    fn upload_texture(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<GpuTexture, GpuError> {
        self.upload_calls += 1;
        validate_rgba8(pixels, width, height)?;

        self.next_texture += 1;
        let handle = GpuTexture(self.next_texture);
        self.textures.insert(handle, (width, height));
        Ok(handle)
    }

    fn release_texture(&mut self, texture: GpuTexture) {
        if self.textures.remove(&texture).is_some() {
            self.released_textures.push(texture);
        }
    }

    fn clear(&mut self, color: ColorRgba, depth: f32) {
        self.clears.push((color, depth));
    }

    fn issue_draw(
        &mut self,
        program: GpuProgram,
        frame: &FrameUniforms,
        instances: &[InstanceUniforms],
    ) -> Result<(), GpuError> {
        if !self.programs.contains_key(&program) {
            return Err(GpuError::UnknownProgram(program.0));
        }
        let textures = instances
            .iter()
            .map(|i| i.texture)
            .chain(frame.point_textures.iter().copied());
        for t in textures {
            if !self.textures.contains_key(&t) {
                return Err(GpuError::UnknownTexture(t.0));
            }
        }

        self.draws.push(RecordedDraw {
            program,
            frame: frame.clone(),
            instances: instances.to_vec(),
        });
        Ok(())
    }

    fn draw_lines(
        &mut self,
        view_projection: &[[f32; 4]; 4],
        segments: &[LineSegment],
    ) -> Result<(), GpuError> {
        self.lines.push(RecordedLines {
            view_projection: *view_projection,
            segments: segments.to_vec(),
        });
        Ok(())
    }
}
