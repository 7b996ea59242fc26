//! Headless graphics context
//!
//! A software implementation of [`GraphicsContext`] for running without a
//! GPU. It is the viewer's backend and the test double every GPU-facing
//! component is tested against. Object tables and binding state live in
//! memory, calls are validated the way a WebGL driver validates them, and
//! clears and draws are recorded for inspection instead of rasterized.
//! Invalid calls never panic; they are recorded as [`ContextError`]s and the
//! call has no effect, matching `glGetError` semantics.
//!
//! Shader compilation is real. Each stage is a WGSL module that naga parses
//! and validates; attribute locations, the stage interface and uniform names
//! are reflected from the validated module.

use super::context::{
    AttributeLocation, BufferHandle, ClearMask, GraphicsContext, GraphicsError, ProgramHandle,
    ShaderHandle, ShaderStage, TextureHandle, UniformLocation,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::num::NonZeroU32;
use tracing::{debug, trace, warn};

/// Number of vertex attribute slots
pub const MAX_VERTEX_ATTRIBS: u32 = 16;
/// Number of texture units
pub const MAX_TEXTURE_UNITS: u32 = 16;

/// GL error class of a rejected call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidValue,
    InvalidOperation,
}

/// A call the context rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextError {
    pub code: ErrorCode,
    pub call: &'static str,
    pub message: String,
}

/// Last value written to a uniform slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec3([f32; 3]),
    Mat4([f32; 16]),
}

/// Attribute stream in effect when a draw was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeBinding {
    pub location: AttributeLocation,
    pub buffer: BufferHandle,
    pub components: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCall {
    pub program: ProgramHandle,
    pub first: u32,
    pub count: u32,
    /// Enabled attribute arrays the program reads, ordered by location
    pub attributes: Vec<AttributeBinding>,
    /// Texture bound to unit 0
    pub texture: Option<TextureHandle>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Clear { mask: ClearMask, color: [f32; 4] },
    Draw(DrawCall),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Reflection {
    /// Location-bound inputs of the entry point
    inputs: Vec<(String, u32)>,
    /// Locations the entry point writes for the next stage
    outputs: Vec<u32>,
    uniforms: Vec<String>,
}

struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    log: String,
    reflection: Reflection,
}

#[derive(Default)]
struct ProgramObject {
    shaders: Vec<ShaderHandle>,
    linked: bool,
    log: String,
    attributes: Vec<(String, u32)>,
    uniforms: Vec<String>,
    values: HashMap<u32, UniformValue>,
}

struct TextureObject {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct AttribPointer {
    buffer: BufferHandle,
    size: u32,
    stride: u32,
    offset: u32,
}

/// In-memory graphics context
#[derive(Default)]
pub struct HeadlessContext {
    next_id: u32,
    object_limit: Option<usize>,

    buffers: HashMap<BufferHandle, Vec<u8>>,
    shaders: HashMap<ShaderHandle, ShaderObject>,
    programs: HashMap<ProgramHandle, ProgramObject>,
    textures: HashMap<TextureHandle, TextureObject>,

    array_buffer: Option<BufferHandle>,
    current_program: Option<ProgramHandle>,
    active_unit: u32,
    texture_units: HashMap<u32, TextureHandle>,
    enabled_attributes: BTreeSet<u32>,
    pointers: BTreeMap<u32, AttribPointer>,
    clear_color: [f32; 4],
    depth_test: bool,

    commands: Vec<Command>,
    errors: Vec<ContextError>,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of live objects; creation beyond the cap fails
    pub fn set_object_limit(&mut self, limit: Option<usize>) {
        self.object_limit = limit;
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drain the command log, typically once per frame
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn draw_calls(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|command| match command {
            Command::Draw(draw) => Some(draw),
            Command::Clear { .. } => None,
        })
    }

    pub fn errors(&self) -> &[ContextError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<ContextError> {
        std::mem::take(&mut self.errors)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn is_buffer(&self, buffer: BufferHandle) -> bool {
        self.buffers.contains_key(&buffer)
    }

    /// Buffer contents reinterpreted as floats
    pub fn buffer_floats(&self, buffer: BufferHandle) -> Option<Vec<f32>> {
        self.buffers
            .get(&buffer)
            .map(|data| bytemuck::pod_collect_to_vec::<u8, f32>(data))
    }

    pub fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        self.textures.get(&texture).map(|t| (t.width, t.height))
    }

    pub fn texture_pixels(&self, texture: TextureHandle) -> Option<&[u8]> {
        self.textures.get(&texture).map(|t| t.pixels.as_slice())
    }

    pub fn shader_source_text(&self, shader: ShaderHandle) -> Option<&str> {
        self.shaders.get(&shader).map(|s| s.source.as_str())
    }

    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.current_program
    }

    pub fn array_buffer(&self) -> Option<BufferHandle> {
        self.array_buffer
    }

    pub fn active_texture_unit(&self) -> u32 {
        self.active_unit
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureHandle> {
        self.texture_units.get(&unit).copied()
    }

    pub fn enabled_attributes(&self) -> impl Iterator<Item = AttributeLocation> + '_ {
        self.enabled_attributes.iter().map(|&l| AttributeLocation(l))
    }

    pub fn clear_color_value(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn depth_test_enabled(&self) -> bool {
        self.depth_test
    }

    /// Value last written to a program's uniform, looked up by name
    pub fn uniform_value(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
        let object = self.programs.get(&program)?;
        let index = object.uniforms.iter().position(|u| u == name)?;
        object.values.get(&(index as u32)).copied()
    }

    fn error(&mut self, code: ErrorCode, call: &'static str, message: impl Into<String>) {
        let message = message.into();
        warn!(?code, call, message = %message, "Graphics call rejected");
        self.errors.push(ContextError {
            code,
            call,
            message,
        });
    }

    fn live_objects(&self) -> usize {
        self.buffers.len() + self.shaders.len() + self.programs.len() + self.textures.len()
    }

    fn allocate(&mut self, object: &'static str) -> Result<NonZeroU32, GraphicsError> {
        if let Some(limit) = self.object_limit {
            if self.live_objects() >= limit {
                return Err(GraphicsError::Create {
                    object,
                    reason: format!("object limit of {limit} reached"),
                });
            }
        }

        let id = self
            .next_id
            .checked_add(1)
            .and_then(NonZeroU32::new)
            .ok_or_else(|| GraphicsError::Create {
                object,
                reason: "handle space exhausted".to_string(),
            })?;
        self.next_id = id.get();
        trace!(object, id = id.get(), "Allocated object");
        Ok(id)
    }

    fn set_uniform(
        &mut self,
        call: &'static str,
        location: Option<&UniformLocation>,
        value: UniformValue,
    ) {
        let Some(location) = location else {
            return;
        };
        let Some(current) = self.current_program else {
            self.error(ErrorCode::InvalidOperation, call, "no program in use");
            return;
        };
        if location.program != current {
            self.error(
                ErrorCode::InvalidOperation,
                call,
                format!("location belongs to {}, not {current}", location.program),
            );
            return;
        }

        let stored = match self.programs.get_mut(&current) {
            Some(program) if (location.index as usize) < program.uniforms.len() => {
                program.values.insert(location.index, value);
                true
            }
            _ => false,
        };
        if !stored {
            self.error(
                ErrorCode::InvalidOperation,
                call,
                format!("no uniform at index {}", location.index),
            );
        }
    }

    /// Validate the arrays the current program reads
    ///
    /// Enabled slots the program has no input for are never fetched, and a
    /// disabled slot the program does read supplies a constant value, so
    /// neither can fail the draw.
    fn check_draw(&self, first: u32, count: u32) -> Result<DrawCall, String> {
        let program = self.current_program.ok_or("no program in use")?;
        let mut consumed: Vec<u32> = match self.programs.get(&program) {
            Some(object) if object.linked => {
                object.attributes.iter().map(|&(_, location)| location).collect()
            }
            _ => return Err(format!("{program} is not linked")),
        };
        consumed.sort_unstable();

        let mut attributes = Vec::with_capacity(consumed.len());
        for location in consumed {
            if !self.enabled_attributes.contains(&location) {
                continue;
            }
            let pointer = self
                .pointers
                .get(&location)
                .ok_or_else(|| format!("attribute {location} is enabled without a buffer"))?;
            let data = self.buffers.get(&pointer.buffer).ok_or_else(|| {
                format!("attribute {location} reads from deleted {}", pointer.buffer)
            })?;

            if count > 0 {
                let element = pointer.size as usize * std::mem::size_of::<f32>();
                let stride = if pointer.stride == 0 {
                    element
                } else {
                    pointer.stride as usize
                };
                let last = (first as usize + count as usize - 1) * stride;
                let needed = pointer.offset as usize + last + element;
                if needed > data.len() {
                    return Err(format!(
                        "attribute {location} needs {needed} bytes, {} has {}",
                        pointer.buffer,
                        data.len()
                    ));
                }
            }

            attributes.push(AttributeBinding {
                location: AttributeLocation(location),
                buffer: pointer.buffer,
                components: pointer.size,
            });
        }

        Ok(DrawCall {
            program,
            first,
            count,
            attributes,
            texture: self.bound_texture(0),
        })
    }

    fn link(&self, program: &ProgramObject) -> Result<Reflection, String> {
        let mut vertex = None;
        let mut fragment = None;

        for handle in &program.shaders {
            let shader = self
                .shaders
                .get(handle)
                .ok_or_else(|| format!("ERROR: attached {handle} was deleted"))?;
            if !shader.compiled {
                return Err(format!("ERROR: {handle} was not compiled successfully"));
            }
            let slot = match shader.stage {
                ShaderStage::Vertex => &mut vertex,
                ShaderStage::Fragment => &mut fragment,
            };
            if slot.replace(&shader.reflection).is_some() {
                return Err(format!("ERROR: more than one {} shader attached", shader.stage));
            }
        }

        let vertex = vertex.ok_or("ERROR: missing vertex shader")?;
        let fragment = fragment.ok_or("ERROR: missing fragment shader")?;

        for (name, location) in &fragment.inputs {
            if !vertex.outputs.contains(location) {
                return Err(format!(
                    "ERROR: fragment input `{name}` at location {location} is not written by the vertex shader"
                ));
            }
        }
        if let Some((name, location)) = vertex
            .inputs
            .iter()
            .find(|(_, location)| *location >= MAX_VERTEX_ATTRIBS)
        {
            return Err(format!(
                "ERROR: attribute `{name}` at location {location} exceeds {MAX_VERTEX_ATTRIBS} slots"
            ));
        }

        let mut uniforms = vertex.uniforms.clone();
        for name in &fragment.uniforms {
            if !uniforms.contains(name) {
                uniforms.push(name.clone());
            }
        }

        Ok(Reflection {
            inputs: vertex.inputs.clone(),
            outputs: Vec::new(),
            uniforms,
        })
    }
}

impl GraphicsContext for HeadlessContext {
    fn create_buffer(&mut self) -> Result<BufferHandle, GraphicsError> {
        let handle = BufferHandle(self.allocate("buffer")?);
        self.buffers.insert(handle, Vec::new());
        Ok(handle)
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_none() {
            return;
        }
        if self.array_buffer == Some(buffer) {
            self.array_buffer = None;
        }
        trace!(%buffer, "Deleted buffer");
    }

    fn bind_array_buffer(&mut self, buffer: Option<BufferHandle>) {
        if let Some(handle) = buffer {
            if !self.buffers.contains_key(&handle) {
                self.error(
                    ErrorCode::InvalidOperation,
                    "bind_array_buffer",
                    format!("{handle} is not a live buffer"),
                );
                return;
            }
        }
        self.array_buffer = buffer;
    }

    fn buffer_data_static(&mut self, data: &[u8]) {
        let Some(target) = self.array_buffer.and_then(|h| self.buffers.get_mut(&h)) else {
            self.error(
                ErrorCode::InvalidOperation,
                "buffer_data_static",
                "no array buffer bound",
            );
            return;
        };
        target.clear();
        target.extend_from_slice(data);
    }

    fn enable_vertex_attrib_array(&mut self, location: AttributeLocation) {
        if location.0 >= MAX_VERTEX_ATTRIBS {
            self.error(
                ErrorCode::InvalidValue,
                "enable_vertex_attrib_array",
                format!("location {} exceeds {MAX_VERTEX_ATTRIBS} slots", location.0),
            );
            return;
        }
        self.enabled_attributes.insert(location.0);
    }

    fn vertex_attrib_pointer_f32(
        &mut self,
        location: AttributeLocation,
        size: u32,
        _normalized: bool,
        stride: u32,
        offset: u32,
    ) {
        const CALL: &str = "vertex_attrib_pointer_f32";
        if location.0 >= MAX_VERTEX_ATTRIBS || !(1..=4).contains(&size) {
            self.error(
                ErrorCode::InvalidValue,
                CALL,
                format!("location {} with {size} components", location.0),
            );
            return;
        }
        let Some(buffer) = self.array_buffer else {
            self.error(ErrorCode::InvalidOperation, CALL, "no array buffer bound");
            return;
        };
        self.pointers.insert(
            location.0,
            AttribPointer {
                buffer,
                size,
                stride,
                offset,
            },
        );
    }

    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderHandle, GraphicsError> {
        let handle = ShaderHandle(self.allocate("shader")?);
        self.shaders.insert(
            handle,
            ShaderObject {
                stage,
                source: String::new(),
                compiled: false,
                log: String::new(),
                reflection: Reflection::default(),
            },
        );
        Ok(handle)
    }

    fn shader_source(&mut self, shader: ShaderHandle, source: &str) {
        match self.shaders.get_mut(&shader) {
            Some(object) => object.source = source.to_string(),
            None => self.error(
                ErrorCode::InvalidValue,
                "shader_source",
                format!("{shader} is not a shader"),
            ),
        }
    }

    fn compile_shader(&mut self, shader: ShaderHandle) {
        let Some(object) = self.shaders.get_mut(&shader) else {
            self.error(
                ErrorCode::InvalidValue,
                "compile_shader",
                format!("{shader} is not a shader"),
            );
            return;
        };

        match wgsl::compile(object.stage, &object.source) {
            Ok(reflection) => {
                debug!(
                    %shader,
                    stage = %object.stage,
                    inputs = reflection.inputs.len(),
                    uniforms = reflection.uniforms.len(),
                    "Compiled shader"
                );
                object.compiled = true;
                object.log.clear();
                object.reflection = reflection;
            }
            Err(log) => {
                object.compiled = false;
                object.log = log;
                object.reflection = Reflection::default();
            }
        }
    }

    fn shader_compile_status(&mut self, shader: ShaderHandle) -> bool {
        self.shaders.get(&shader).is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&mut self, shader: ShaderHandle) -> String {
        self.shaders
            .get(&shader)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        if self.shaders.remove(&shader).is_some() {
            trace!(%shader, "Deleted shader");
        }
    }

    fn create_program(&mut self) -> Result<ProgramHandle, GraphicsError> {
        let handle = ProgramHandle(self.allocate("program")?);
        self.programs.insert(handle, ProgramObject::default());
        Ok(handle)
    }

    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        if !self.shaders.contains_key(&shader) {
            self.error(
                ErrorCode::InvalidValue,
                "attach_shader",
                format!("{shader} is not a shader"),
            );
            return;
        }
        let attached = self
            .programs
            .get(&program)
            .map(|object| object.shaders.contains(&shader));
        match attached {
            Some(false) => {
                if let Some(object) = self.programs.get_mut(&program) {
                    object.shaders.push(shader);
                }
            }
            Some(true) => self.error(
                ErrorCode::InvalidOperation,
                "attach_shader",
                format!("{shader} is already attached to {program}"),
            ),
            None => self.error(
                ErrorCode::InvalidValue,
                "attach_shader",
                format!("{program} is not a program"),
            ),
        }
    }

    fn link_program(&mut self, program: ProgramHandle) {
        let Some(object) = self.programs.get(&program) else {
            self.error(
                ErrorCode::InvalidValue,
                "link_program",
                format!("{program} is not a program"),
            );
            return;
        };

        let outcome = self.link(object);
        if let Some(object) = self.programs.get_mut(&program) {
            object.values.clear();
            match outcome {
                Ok(reflection) => {
                    debug!(
                        %program,
                        attributes = ?reflection.inputs,
                        uniforms = ?reflection.uniforms,
                        "Linked program"
                    );
                    object.linked = true;
                    object.log.clear();
                    object.attributes = reflection.inputs;
                    object.uniforms = reflection.uniforms;
                }
                Err(log) => {
                    object.linked = false;
                    object.log = log;
                    object.attributes.clear();
                    object.uniforms.clear();
                }
            }
        }
    }

    fn program_link_status(&mut self, program: ProgramHandle) -> bool {
        self.programs.get(&program).is_some_and(|p| p.linked)
    }

    fn program_info_log(&mut self, program: ProgramHandle) -> String {
        self.programs
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_none() {
            return;
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        trace!(%program, "Deleted program");
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        if let Some(handle) = program {
            let message = match self.programs.get(&handle).map(|p| p.linked) {
                Some(true) => None,
                Some(false) => Some(format!("{handle} is not linked")),
                None => Some(format!("{handle} is not a live program")),
            };
            if let Some(message) = message {
                self.error(ErrorCode::InvalidOperation, "use_program", message);
                return;
            }
        }
        self.current_program = program;
    }

    fn attrib_location(
        &mut self,
        program: ProgramHandle,
        name: &str,
    ) -> Option<AttributeLocation> {
        match self.programs.get(&program).filter(|p| p.linked) {
            Some(object) => object
                .attributes
                .iter()
                .find(|(attribute, _)| attribute == name)
                .map(|&(_, location)| AttributeLocation(location)),
            None => {
                self.error(
                    ErrorCode::InvalidOperation,
                    "attrib_location",
                    format!("{program} is not linked"),
                );
                None
            }
        }
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let index = match self.programs.get(&program).filter(|p| p.linked) {
            Some(object) => object.uniforms.iter().position(|u| u == name),
            None => {
                self.error(
                    ErrorCode::InvalidOperation,
                    "uniform_location",
                    format!("{program} is not linked"),
                );
                return None;
            }
        };
        index.map(|index| UniformLocation {
            program,
            index: index as u32,
        })
    }

    fn uniform_1_f32(&mut self, location: Option<&UniformLocation>, x: f32) {
        self.set_uniform("uniform_1_f32", location, UniformValue::Float(x));
    }

    fn uniform_1_i32(&mut self, location: Option<&UniformLocation>, x: i32) {
        self.set_uniform("uniform_1_i32", location, UniformValue::Int(x));
    }

    fn uniform_3_f32(&mut self, location: Option<&UniformLocation>, x: f32, y: f32, z: f32) {
        self.set_uniform("uniform_3_f32", location, UniformValue::Vec3([x, y, z]));
    }

    fn uniform_matrix_4_f32(&mut self, location: Option<&UniformLocation>, matrix: &[f32; 16]) {
        self.set_uniform("uniform_matrix_4_f32", location, UniformValue::Mat4(*matrix));
    }

    fn create_texture(&mut self) -> Result<TextureHandle, GraphicsError> {
        let handle = TextureHandle(self.allocate("texture")?);
        self.textures.insert(
            handle,
            TextureObject {
                width: 0,
                height: 0,
                pixels: Vec::new(),
            },
        );
        Ok(handle)
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_none() {
            return;
        }
        self.texture_units.retain(|_, bound| *bound != texture);
        trace!(%texture, "Deleted texture");
    }

    fn active_texture(&mut self, unit: u32) {
        if unit >= MAX_TEXTURE_UNITS {
            self.error(
                ErrorCode::InvalidValue,
                "active_texture",
                format!("unit {unit} exceeds {MAX_TEXTURE_UNITS} units"),
            );
            return;
        }
        self.active_unit = unit;
    }

    fn bind_texture_2d(&mut self, texture: Option<TextureHandle>) {
        match texture {
            Some(handle) if !self.textures.contains_key(&handle) => self.error(
                ErrorCode::InvalidOperation,
                "bind_texture_2d",
                format!("{handle} is not a live texture"),
            ),
            Some(handle) => {
                self.texture_units.insert(self.active_unit, handle);
            }
            None => {
                self.texture_units.remove(&self.active_unit);
            }
        }
    }

    fn tex_image_2d_rgba(&mut self, width: u32, height: u32, pixels: &[u8]) {
        const CALL: &str = "tex_image_2d_rgba";
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            self.error(
                ErrorCode::InvalidValue,
                CALL,
                format!("{} bytes for {width}x{height}", pixels.len()),
            );
            return;
        }
        let bound = self.bound_texture(self.active_unit);
        let Some(object) = bound.and_then(|h| self.textures.get_mut(&h)) else {
            self.error(ErrorCode::InvalidOperation, CALL, "no texture bound");
            return;
        };
        object.width = width;
        object.height = height;
        object.pixels = pixels.to_vec();
    }

    fn clear_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.clear_color = [red, green, blue, alpha];
    }

    fn clear(&mut self, mask: ClearMask) {
        self.commands.push(Command::Clear {
            mask,
            color: self.clear_color,
        });
    }

    fn enable_depth_test(&mut self) {
        self.depth_test = true;
    }

    fn draw_arrays_triangles(&mut self, first: u32, count: u32) {
        match self.check_draw(first, count) {
            Ok(draw) => {
                trace!(program = %draw.program, first, count, "Draw");
                self.commands.push(Command::Draw(draw));
            }
            Err(message) => self.error(ErrorCode::InvalidOperation, "draw_arrays_triangles", message),
        }
    }
}

/// WGSL front end: parse, validate and reflect one shader stage
mod wgsl {
    use super::Reflection;
    use crate::graphics::context::ShaderStage;
    use naga::valid::{Capabilities, ValidationFlags, Validator};
    use naga::{AddressSpace, Binding, Handle, Module, Type, TypeInner};

    /// Compile `source` as `stage`, returning its interface or the error log
    pub(super) fn compile(stage: ShaderStage, source: &str) -> Result<Reflection, String> {
        let module =
            naga::front::wgsl::parse_str(source).map_err(|err| err.emit_to_string(source))?;
        Validator::new(ValidationFlags::all(), Capabilities::empty())
            .validate(&module)
            .map_err(|err| err.emit_to_string(source))?;

        let wanted = match stage {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        };
        let entry = module
            .entry_points
            .iter()
            .find(|entry| entry.stage == wanted)
            .ok_or_else(|| format!("error: no @{stage} entry point"))?;

        let mut inputs = Vec::new();
        for argument in &entry.function.arguments {
            locations(
                &module,
                argument.name.as_deref(),
                argument.ty,
                argument.binding.as_ref(),
                &mut inputs,
            );
        }

        let mut outputs = Vec::new();
        if let Some(result) = &entry.function.result {
            locations(&module, None, result.ty, result.binding.as_ref(), &mut outputs);
        }

        let uniforms = module
            .global_variables
            .iter()
            .filter(|(_, global)| {
                matches!(global.space, AddressSpace::Uniform | AddressSpace::Handle)
            })
            .filter_map(|(_, global)| global.name.clone())
            .collect();

        Ok(Reflection {
            inputs,
            outputs: outputs.into_iter().map(|(_, location)| location).collect(),
            uniforms,
        })
    }

    /// Collect `@location` bindings, looking through struct members
    fn locations(
        module: &Module,
        name: Option<&str>,
        ty: Handle<Type>,
        binding: Option<&Binding>,
        found: &mut Vec<(String, u32)>,
    ) {
        match binding {
            Some(Binding::Location { location, .. }) => {
                found.push((name.unwrap_or_default().to_string(), *location));
            }
            Some(Binding::BuiltIn(_)) => {}
            None => {
                if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                    for member in members {
                        locations(
                            module,
                            member.name.as_deref(),
                            member.ty,
                            member.binding.as_ref(),
                            found,
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = "
        // braces in comments { are ignored
        @group(0) @binding(0) var<uniform> model: mat4x4<f32>;
        @group(0) @binding(1) var<uniform> view: mat4x4<f32>;
        @group(0) @binding(2) var<uniform> projection: mat4x4<f32>;

        struct VertexOutput {
            @builtin(position) clip: vec4<f32>,
            @location(0) uv: vec2<f32>,
        }

        @vertex
        fn main(
            @location(0) position: vec3<f32>,
            @location(1) normal: vec3<f32>,
            @location(5) uv: vec2<f32>,
        ) -> VertexOutput {
            var output: VertexOutput;
            output.uv = uv;
            output.clip = projection * view * model * vec4<f32>(position, 1.0);
            return output;
        }
    ";

    const FRAGMENT: &str = "
        @group(0) @binding(1) var<uniform> view: mat4x4<f32>;
        @group(0) @binding(3) var diffuse: texture_2d<f32>;
        @group(0) @binding(4) var diffuse_sampler: sampler;

        @fragment
        fn main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
            return textureSample(diffuse, diffuse_sampler, uv);
        }
    ";

    fn compiled(gl: &mut HeadlessContext, stage: ShaderStage, source: &str) -> ShaderHandle {
        let shader = gl.create_shader(stage).unwrap();
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        shader
    }

    fn link_pair(gl: &mut HeadlessContext, vertex: &str, fragment: &str) -> ProgramHandle {
        let vs = compiled(gl, ShaderStage::Vertex, vertex);
        let fs = compiled(gl, ShaderStage::Fragment, fragment);
        let program = gl.create_program().unwrap();
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);
        program
    }

    fn linked(gl: &mut HeadlessContext) -> ProgramHandle {
        link_pair(gl, VERTEX, FRAGMENT)
    }

    #[test]
    fn test_reflection_reports_declared_locations() {
        let mut gl = HeadlessContext::new();
        let program = linked(&mut gl);
        assert!(gl.program_link_status(program), "{}", gl.program_info_log(program));

        assert_eq!(gl.attrib_location(program, "position"), Some(AttributeLocation(0)));
        assert_eq!(gl.attrib_location(program, "normal"), Some(AttributeLocation(1)));
        assert_eq!(gl.attrib_location(program, "uv"), Some(AttributeLocation(5)));
        assert_eq!(gl.attrib_location(program, "clip"), None);

        let diffuse = gl.uniform_location(program, "diffuse").unwrap();
        let view = gl.uniform_location(program, "view").unwrap();
        assert_ne!(diffuse.index, view.index);
        assert!(gl.uniform_location(program, "projection").is_some());
        assert_eq!(gl.uniform_location(program, "missing"), None);
        assert!(gl.errors().is_empty());
    }

    #[test]
    fn test_invalid_sources_fail_to_compile() {
        let broken = [
            // missing semicolon
            "@fragment\nfn main() -> @location(0) vec4<f32> {\n    return vec4<f32>(1.0)\n}",
            // empty initializer
            "@fragment\nfn main() -> @location(0) vec4<f32> {\n    let color = ;\n    return color;\n}",
            // dangling operator
            "@fragment\nfn main() -> @location(0) vec4<f32> {\n    return vec4<f32>(1.0 +* 2.0);\n}",
            // wrong return type
            "@fragment\nfn main() -> @location(0) vec4<f32> {\n    return 1.0;\n}",
        ];

        let mut gl = HeadlessContext::new();
        for source in broken {
            let fs = compiled(&mut gl, ShaderStage::Fragment, source);
            assert!(!gl.shader_compile_status(fs), "accepted: {source}");
            assert!(gl.shader_info_log(fs).contains("error"));
        }
    }

    #[test]
    fn test_missing_entry_point_fails_to_compile() {
        let mut gl = HeadlessContext::new();
        let vs = compiled(&mut gl, ShaderStage::Vertex, FRAGMENT);
        assert!(!gl.shader_compile_status(vs));
        assert!(gl.shader_info_log(vs).contains("@vertex entry point"));
    }

    #[test]
    fn test_link_rejects_unwritten_fragment_input() {
        let mut gl = HeadlessContext::new();
        let fragment = "
            @fragment
            fn main(@location(1) normal: vec3<f32>) -> @location(0) vec4<f32> {
                return vec4<f32>(normal, 1.0);
            }
        ";
        let program = link_pair(&mut gl, VERTEX, fragment);
        assert!(!gl.program_link_status(program));
        assert!(gl.program_info_log(program).contains("location 1"));
    }

    #[test]
    fn test_draw_ignores_enabled_arrays_the_program_does_not_read() {
        let mut gl = HeadlessContext::new();
        let program = linked(&mut gl);

        // left enabled by earlier work, pointing at a buffer that is gone
        let stale = gl.create_buffer().unwrap();
        gl.bind_array_buffer(Some(stale));
        gl.buffer_data_static(bytemuck::cast_slice(&[0.0f32; 3]));
        gl.enable_vertex_attrib_array(AttributeLocation(7));
        gl.vertex_attrib_pointer_f32(AttributeLocation(7), 3, false, 0, 0);
        gl.delete_buffer(stale);

        let buffer = gl.create_buffer().unwrap();
        gl.bind_array_buffer(Some(buffer));
        gl.buffer_data_static(bytemuck::cast_slice(&[0.0f32; 9]));
        gl.enable_vertex_attrib_array(AttributeLocation(0));
        gl.vertex_attrib_pointer_f32(AttributeLocation(0), 3, false, 0, 0);
        gl.use_program(Some(program));
        gl.draw_arrays_triangles(0, 3);

        assert!(gl.errors().is_empty(), "{:?}", gl.errors());
        let draw = gl.draw_calls().next().unwrap();
        assert_eq!(draw.attributes.len(), 1);
        assert_eq!(draw.attributes[0].location, AttributeLocation(0));
    }

    #[test]
    fn test_link_requires_both_stages() {
        let mut gl = HeadlessContext::new();
        let vs = gl.create_shader(ShaderStage::Vertex).unwrap();
        gl.shader_source(vs, VERTEX);
        gl.compile_shader(vs);
        let program = gl.create_program().unwrap();
        gl.attach_shader(program, vs);
        gl.link_program(program);
        assert!(!gl.program_link_status(program));
        assert!(gl.program_info_log(program).contains("fragment"));
    }

    #[test]
    fn test_uniform_write_through_missing_location_is_ignored() {
        let mut gl = HeadlessContext::new();
        let program = linked(&mut gl);
        gl.use_program(Some(program));
        gl.uniform_1_f32(None, 1.0);
        assert!(gl.errors().is_empty());
    }

    #[test]
    fn test_uniform_write_requires_matching_program() {
        let mut gl = HeadlessContext::new();
        let first = linked(&mut gl);
        let second = linked(&mut gl);
        let location = gl.uniform_location(first, "diffuse").unwrap();

        gl.uniform_1_i32(Some(&location), 0);
        gl.use_program(Some(second));
        gl.uniform_1_i32(Some(&location), 0);

        let errors = gl.take_errors();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.code == ErrorCode::InvalidOperation));

        gl.use_program(Some(first));
        gl.uniform_1_i32(Some(&location), 3);
        assert_eq!(gl.uniform_value(first, "diffuse"), Some(UniformValue::Int(3)));
    }

    #[test]
    fn test_deleted_buffer_cannot_be_rebound() {
        let mut gl = HeadlessContext::new();
        let buffer = gl.create_buffer().unwrap();
        gl.bind_array_buffer(Some(buffer));
        gl.delete_buffer(buffer);
        assert_eq!(gl.array_buffer(), None);

        gl.bind_array_buffer(Some(buffer));
        assert_eq!(gl.array_buffer(), None);
        assert_eq!(gl.errors()[0].code, ErrorCode::InvalidOperation);
    }

    #[test]
    fn test_handles_are_never_reused() {
        let mut gl = HeadlessContext::new();
        let first = gl.create_buffer().unwrap();
        gl.delete_buffer(first);
        let second = gl.create_buffer().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_draw_checks_buffer_capacity() {
        let mut gl = HeadlessContext::new();
        let program = linked(&mut gl);
        let buffer = gl.create_buffer().unwrap();
        gl.bind_array_buffer(Some(buffer));
        gl.buffer_data_static(bytemuck::cast_slice(&[0.0f32; 9]));
        gl.enable_vertex_attrib_array(AttributeLocation(0));
        gl.vertex_attrib_pointer_f32(AttributeLocation(0), 3, false, 0, 0);
        gl.use_program(Some(program));

        gl.draw_arrays_triangles(0, 3);
        assert_eq!(gl.draw_calls().count(), 1);

        gl.draw_arrays_triangles(0, 6);
        assert_eq!(gl.draw_calls().count(), 1);
        assert_eq!(gl.errors().len(), 1);
    }

    #[test]
    fn test_draw_without_program_is_rejected() {
        let mut gl = HeadlessContext::new();
        gl.draw_arrays_triangles(0, 3);
        assert_eq!(gl.draw_calls().count(), 0);
        assert_eq!(gl.errors()[0].call, "draw_arrays_triangles");
    }

    #[test]
    fn test_texture_upload_and_units() {
        let mut gl = HeadlessContext::new();
        let texture = gl.create_texture().unwrap();
        gl.active_texture(1);
        gl.bind_texture_2d(Some(texture));
        gl.tex_image_2d_rgba(2, 1, &[255; 8]);
        assert_eq!(gl.texture_size(texture), Some((2, 1)));
        assert_eq!(gl.bound_texture(1), Some(texture));
        assert_eq!(gl.bound_texture(0), None);

        gl.delete_texture(texture);
        assert_eq!(gl.bound_texture(1), None);
    }

    #[test]
    fn test_object_limit() {
        let mut gl = HeadlessContext::new();
        gl.set_object_limit(Some(1));
        assert!(gl.create_buffer().is_ok());
        assert!(matches!(
            gl.create_texture(),
            Err(GraphicsError::Create { object: "texture", .. })
        ));
    }
}
