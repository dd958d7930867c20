//! OpenGL shader loading.
//!
//! This module reads GLSL stage sources from disk, compiles them, and links
//! them into a program. The entry points are [`load_shaders`] and
//! [`ShaderLoader`]. Graphics calls go through the [`ShaderBackend`] trait,
//! implemented for [`glow::Context`].
//!
//! Returned programs are owned by the caller. [`ShaderProgram`] wraps one
//! with uniform setters and deletes it on drop.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};
use glow::HasContext;
use serde::{Deserialize, Serialize};

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// The GL enum passed to `glCreateShader`.
    pub fn gl_type(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Handle to a shader stage object. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageHandle(NonZeroU32);

impl StageHandle {
    /// Wraps a raw shader object id.
    pub fn new(raw: NonZeroU32) -> Self {
        Self(raw)
    }

    /// The GL object id.
    pub fn raw(self) -> u32 {
        self.0.get()
    }
}

/// Handle to a program object. [`ProgramHandle::NONE`] (raw `0`) marks a
/// failed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProgramHandle(u32);

impl ProgramHandle {
    /// The failure sentinel.
    pub const NONE: ProgramHandle = ProgramHandle(0);

    /// Wraps a raw program object id. `0` gives [`ProgramHandle::NONE`].
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The GL object id, `0` for [`ProgramHandle::NONE`].
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Whether this is the failure sentinel.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Whether this names a program object.
    pub fn is_some(self) -> bool {
        self.0 != 0
    }

    fn native(self) -> Option<glow::NativeProgram> {
        NonZeroU32::new(self.0).map(glow::NativeProgram)
    }
}

impl From<NonZeroU32> for ProgramHandle {
    fn from(raw: NonZeroU32) -> Self {
        Self(raw.get())
    }
}

/// The graphics calls the loader needs.
///
/// All methods must be called on the thread that owns the current context.
pub trait ShaderBackend {
    fn create_stage(&self, stage: ShaderStage) -> Result<StageHandle, String>;
    fn compile_stage(&self, handle: StageHandle, source: &str);
    fn stage_compile_status(&self, handle: StageHandle) -> bool;
    fn stage_info_log(&self, handle: StageHandle) -> String;
    fn delete_stage(&self, handle: StageHandle);

    fn create_program(&self) -> Result<ProgramHandle, String>;
    fn attach_stage(&self, program: ProgramHandle, handle: StageHandle);
    fn detach_stage(&self, program: ProgramHandle, handle: StageHandle);
    fn link_program(&self, program: ProgramHandle);
    fn program_link_status(&self, program: ProgramHandle) -> bool;
    fn program_info_log(&self, program: ProgramHandle) -> String;
    fn delete_program(&self, program: ProgramHandle);
}

impl ShaderBackend for glow::Context {
    fn create_stage(&self, stage: ShaderStage) -> Result<StageHandle, String> {
        let shader = unsafe { self.create_shader(stage.gl_type())? };
        Ok(StageHandle(shader.0))
    }

    fn compile_stage(&self, handle: StageHandle, source: &str) {
        let shader = glow::NativeShader(handle.0);
        unsafe {
            self.shader_source(shader, source);
            self.compile_shader(shader);
        }
    }

    fn stage_compile_status(&self, handle: StageHandle) -> bool {
        unsafe { self.get_shader_compile_status(glow::NativeShader(handle.0)) }
    }

    fn stage_info_log(&self, handle: StageHandle) -> String {
        unsafe { self.get_shader_info_log(glow::NativeShader(handle.0)) }
    }

    fn delete_stage(&self, handle: StageHandle) {
        unsafe { self.delete_shader(glow::NativeShader(handle.0)) }
    }

    fn create_program(&self) -> Result<ProgramHandle, String> {
        let program = unsafe { HasContext::create_program(self)? };
        Ok(ProgramHandle::from(program.0))
    }

    fn attach_stage(&self, program: ProgramHandle, handle: StageHandle) {
        if let Some(program) = program.native() {
            unsafe { self.attach_shader(program, glow::NativeShader(handle.0)) }
        }
    }

    fn detach_stage(&self, program: ProgramHandle, handle: StageHandle) {
        if let Some(program) = program.native() {
            unsafe { self.detach_shader(program, glow::NativeShader(handle.0)) }
        }
    }

    fn link_program(&self, program: ProgramHandle) {
        if let Some(program) = program.native() {
            unsafe { HasContext::link_program(self, program) }
        }
    }

    fn program_link_status(&self, program: ProgramHandle) -> bool {
        program
            .native()
            .is_some_and(|program| unsafe { self.get_program_link_status(program) })
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        program
            .native()
            .map(|program| unsafe { self.get_program_info_log(program) })
            .unwrap_or_default()
    }

    fn delete_program(&self, program: ProgramHandle) {
        if let Some(program) = program.native() {
            unsafe { HasContext::delete_program(self, program) }
        }
    }
}

/// What the loader does when a stage fails to compile or the program fails
/// to link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPolicy {
    /// Report the logs and return the program handle anyway.
    #[default]
    Lenient,
    /// Report the logs, delete the program and return [`ProgramHandle::NONE`].
    Strict,
}

/// A non-empty info log produced while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    CompileLog {
        stage: ShaderStage,
        path: PathBuf,
        log: String,
    },
    LinkLog {
        log: String,
    },
}

/// Errors that abort a load before a program is produced.
#[derive(Debug)]
pub enum LoadError {
    /// A source file could not be opened.
    FileNotFound {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A source file was opened but reading it failed, e.g. it is not UTF-8.
    InvalidSource {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The driver refused to create a shader or program object.
    Backend(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::FileNotFound { path, source } => {
                write!(f, "cannot open shader source {}: {}", path.display(), source)
            }
            LoadError::InvalidSource { path, source } => {
                write!(f, "cannot read shader source {}: {}", path.display(), source)
            }
            LoadError::Backend(msg) => write!(f, "backend error: {}", msg),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::FileNotFound { source, .. } => Some(source),
            LoadError::InvalidSource { source, .. } => Some(source),
            LoadError::Backend(_) => None,
        }
    }
}

/// Result of a load that got as far as linking.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// [`ProgramHandle::NONE`] only under [`LoadPolicy::Strict`] after a failure.
    pub program: ProgramHandle,
    pub vertex_compiled: bool,
    pub fragment_compiled: bool,
    pub linked: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadOutcome {
    /// Whether both stages compiled and the program linked.
    pub fn succeeded(&self) -> bool {
        self.vertex_compiled && self.fragment_compiled && self.linked
    }
}

/// Reads a shader source file. Each line is prefixed with a newline, so the
/// text starts with `\n` and has no trailing newline.
pub fn read_source(path: &Path) -> Result<String, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::FileNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    let mut code = String::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| LoadError::InvalidSource {
            path: path.to_path_buf(),
            source,
        })?;
        code.push('\n');
        code.push_str(&line);
    }
    Ok(code)
}

/// Loads, compiles and links a vertex and a fragment shader with
/// [`LoadPolicy::Lenient`].
///
/// Returns [`ProgramHandle::NONE`] if either file cannot be read. Compile and
/// link failures are logged but a handle is still returned.
pub fn load_shaders<B: ShaderBackend + ?Sized>(
    backend: &B,
    vertex_path: impl AsRef<Path>,
    fragment_path: impl AsRef<Path>,
) -> ProgramHandle {
    ShaderLoader::default().load(backend, vertex_path, fragment_path)
}

/// Stateless shader program loader.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShaderLoader {
    policy: LoadPolicy,
}

struct CompiledStage {
    handle: StageHandle,
    compiled: bool,
}

impl ShaderLoader {
    /// A loader applying `policy` to compile and link failures.
    pub fn new(policy: LoadPolicy) -> Self {
        Self { policy }
    }

    /// Loads a program, logging any error and returning
    /// [`ProgramHandle::NONE`] in its place.
    pub fn load<B: ShaderBackend + ?Sized>(
        &self,
        backend: &B,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> ProgramHandle {
        match self.load_detailed(backend, vertex_path, fragment_path) {
            Ok(outcome) => outcome.program,
            Err(e) => {
                log::error!("{}", e);
                ProgramHandle::NONE
            }
        }
    }

    /// Loads a program and returns it with every info log collected on the
    /// way. Both sources are read before any backend object is created.
    pub fn load_detailed<B: ShaderBackend + ?Sized>(
        &self,
        backend: &B,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> Result<LoadOutcome, LoadError> {
        let vertex_path = vertex_path.as_ref();
        let fragment_path = fragment_path.as_ref();

        let vertex_source = read_source(vertex_path)?;
        let fragment_source = read_source(fragment_path)?;

        let mut diagnostics = Vec::new();

        let vertex = compile_stage(
            backend,
            ShaderStage::Vertex,
            vertex_path,
            &vertex_source,
            &mut diagnostics,
        )?;
        let fragment = match compile_stage(
            backend,
            ShaderStage::Fragment,
            fragment_path,
            &fragment_source,
            &mut diagnostics,
        ) {
            Ok(stage) => stage,
            Err(e) => {
                backend.delete_stage(vertex.handle);
                return Err(e);
            }
        };

        log::info!("Linking program");
        let program = match backend.create_program() {
            Ok(program) => program,
            Err(e) => {
                backend.delete_stage(vertex.handle);
                backend.delete_stage(fragment.handle);
                return Err(LoadError::Backend(e));
            }
        };

        backend.attach_stage(program, vertex.handle);
        backend.attach_stage(program, fragment.handle);
        backend.link_program(program);

        let linked = backend.program_link_status(program);
        let log = backend.program_info_log(program);
        if !log.trim().is_empty() {
            if linked {
                log::warn!("Program link log:\n{}", log);
            } else {
                log::error!("Program link failed:\n{}", log);
            }
            diagnostics.push(Diagnostic::LinkLog { log });
        }

        for stage in [&vertex, &fragment] {
            backend.detach_stage(program, stage.handle);
            backend.delete_stage(stage.handle);
        }

        let mut outcome = LoadOutcome {
            program,
            vertex_compiled: vertex.compiled,
            fragment_compiled: fragment.compiled,
            linked,
            diagnostics,
        };

        if self.policy == LoadPolicy::Strict && !outcome.succeeded() {
            log::error!(
                "Discarding program built from {} and {}",
                vertex_path.display(),
                fragment_path.display()
            );
            backend.delete_program(program);
            outcome.program = ProgramHandle::NONE;
        }

        Ok(outcome)
    }
}

fn compile_stage<B: ShaderBackend + ?Sized>(
    backend: &B,
    stage: ShaderStage,
    path: &Path,
    source: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<CompiledStage, LoadError> {
    log::info!("Compiling shader: {}", path.display());

    let handle = backend.create_stage(stage).map_err(LoadError::Backend)?;
    backend.compile_stage(handle, source);

    let compiled = backend.stage_compile_status(handle);
    let log = backend.stage_info_log(handle);
    if !log.trim().is_empty() {
        if compiled {
            log::warn!("{} shader {}:\n{}", stage, path.display(), log);
        } else {
            log::error!("{} shader {} failed to compile:\n{}", stage, path.display(), log);
        }
        diagnostics.push(Diagnostic::CompileLog {
            stage,
            path: path.to_path_buf(),
            log,
        });
    }

    Ok(CompiledStage { handle, compiled })
}

/// A value that can be uploaded to a uniform variable.
pub trait Uniform {
    fn set_uniform(&self, gl: &glow::Context, location: &glow::UniformLocation);
}

impl Uniform for bool {
    fn set_uniform(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_1_i32(Some(location), *self as i32) }
    }
}

impl Uniform for i32 {
    fn set_uniform(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_1_i32(Some(location), *self) }
    }
}

impl Uniform for f32 {
    fn set_uniform(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_1_f32(Some(location), *self) }
    }
}

impl Uniform for Vec2 {
    fn set_uniform(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_2_f32(Some(location), self.x, self.y) }
    }
}

impl Uniform for Vec3 {
    fn set_uniform(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_3_f32(Some(location), self.x, self.y, self.z) }
    }
}

impl Uniform for Vec4 {
    fn set_uniform(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_4_f32(Some(location), self.x, self.y, self.z, self.w) }
    }
}

impl Uniform for Mat4 {
    fn set_uniform(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_matrix_4_f32_slice(Some(location), false, self.as_ref()) }
    }
}

/// An owned, linked shader program. The program is deleted on drop.
pub struct ShaderProgram {
    gl: Arc<glow::Context>,
    id: glow::NativeProgram,
}

impl ShaderProgram {
    /// Takes ownership of a loaded program. Returns `None` for
    /// [`ProgramHandle::NONE`].
    pub fn from_handle(gl: &Arc<glow::Context>, handle: ProgramHandle) -> Option<Self> {
        handle.native().map(|id| Self {
            gl: Arc::clone(gl),
            id,
        })
    }

    /// Binds the program for drawing.
    pub fn use_program(&self) {
        unsafe {
            self.gl.use_program(Some(self.id));
        }
    }

    /// Sets a uniform on this program. Unknown names are ignored.
    ///
    /// The program must be bound with [`ShaderProgram::use_program`] first.
    pub fn set_uniform<T: Uniform>(&self, name: &str, value: T) {
        let location = unsafe { self.gl.get_uniform_location(self.id, name) };
        if let Some(location) = location {
            value.set_uniform(&self.gl, &location);
        }
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        unsafe {
            HasContext::delete_program(&*self.gl, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::io::Write;

    const VALID_VERT: &str = "#version 330 core\nlayout(location = 0) in vec2 pos;\nvoid main() {\n    gl_Position = vec4(pos, 0.0, 1.0);\n}\n";
    const VALID_FRAG: &str = "#version 330 core\nout vec4 color;\nvoid main() {\n    color = vec4(1.0);\n}\n";
    const BROKEN_VERT: &str = "#version 330 core\nvoid main( {\n";

    struct FakeStage {
        stage: ShaderStage,
        compiled: bool,
        log: String,
    }

    #[derive(Default)]
    struct FakeProgram {
        attached: Vec<u32>,
        linked: bool,
        log: String,
    }

    #[derive(Default)]
    struct FakeState {
        next_id: u32,
        objects_created: usize,
        stages: HashMap<u32, FakeStage>,
        programs: HashMap<u32, FakeProgram>,
    }

    /// In-memory stand-in for a GL context. A stage compiles if its source
    /// has balanced parentheses and a `main`; `#warning` lines produce a log
    /// without failing. `refuse_stage` and `refuse_program` make object
    /// creation fail the way a driver out of resources would.
    #[derive(Default)]
    struct FakeGl {
        state: RefCell<FakeState>,
        refuse_stage: Cell<Option<ShaderStage>>,
        refuse_program: Cell<bool>,
    }

    impl FakeGl {
        fn live_stages(&self) -> usize {
            self.state.borrow().stages.len()
        }

        fn live_programs(&self) -> usize {
            self.state.borrow().programs.len()
        }

        fn objects_created(&self) -> usize {
            self.state.borrow().objects_created
        }

        fn next_id(state: &mut FakeState) -> NonZeroU32 {
            state.next_id += 1;
            state.objects_created += 1;
            NonZeroU32::new(state.next_id).unwrap()
        }
    }

    impl ShaderBackend for FakeGl {
        fn create_stage(&self, stage: ShaderStage) -> Result<StageHandle, String> {
            if self.refuse_stage.get() == Some(stage) {
                return Err(format!("cannot create {stage} shader"));
            }
            let mut state = self.state.borrow_mut();
            let id = Self::next_id(&mut state);
            state.stages.insert(
                id.get(),
                FakeStage {
                    stage,
                    compiled: false,
                    log: String::new(),
                },
            );
            Ok(StageHandle::new(id))
        }

        fn compile_stage(&self, handle: StageHandle, source: &str) {
            let mut state = self.state.borrow_mut();
            let stage = state.stages.get_mut(&handle.raw()).unwrap();
            let balanced = source.matches('(').count() == source.matches(')').count();
            stage.compiled = balanced && source.contains("void main");
            stage.log = if !stage.compiled {
                "0:2(12): error: syntax error, unexpected '{'".to_string()
            } else if source.contains("#warning") {
                "0:1(1): warning: user warning".to_string()
            } else {
                String::new()
            };
        }

        fn stage_compile_status(&self, handle: StageHandle) -> bool {
            self.state.borrow().stages[&handle.raw()].compiled
        }

        fn stage_info_log(&self, handle: StageHandle) -> String {
            self.state.borrow().stages[&handle.raw()].log.clone()
        }

        fn delete_stage(&self, handle: StageHandle) {
            self.state.borrow_mut().stages.remove(&handle.raw());
        }

        fn create_program(&self) -> Result<ProgramHandle, String> {
            if self.refuse_program.get() {
                return Err("cannot create program".to_string());
            }
            let mut state = self.state.borrow_mut();
            let id = Self::next_id(&mut state);
            state.programs.insert(id.get(), FakeProgram::default());
            Ok(ProgramHandle::from(id))
        }

        fn attach_stage(&self, program: ProgramHandle, handle: StageHandle) {
            let mut state = self.state.borrow_mut();
            state
                .programs
                .get_mut(&program.raw())
                .unwrap()
                .attached
                .push(handle.raw());
        }

        fn detach_stage(&self, program: ProgramHandle, handle: StageHandle) {
            let mut state = self.state.borrow_mut();
            let program = state.programs.get_mut(&program.raw()).unwrap();
            program.attached.retain(|&id| id != handle.raw());
        }

        fn link_program(&self, program: ProgramHandle) {
            let mut state = self.state.borrow_mut();
            let state = &mut *state;
            let program = state.programs.get_mut(&program.raw()).unwrap();
            let stages: Vec<&FakeStage> = program
                .attached
                .iter()
                .filter_map(|id| state.stages.get(id))
                .collect();
            let has = |kind: ShaderStage| stages.iter().any(|s| s.stage == kind);
            program.linked = stages.iter().all(|s| s.compiled)
                && has(ShaderStage::Vertex)
                && has(ShaderStage::Fragment);
            if !program.linked {
                program.log = "error: linking with uncompiled shader".to_string();
            }
        }

        fn program_link_status(&self, program: ProgramHandle) -> bool {
            self.state.borrow().programs[&program.raw()].linked
        }

        fn program_info_log(&self, program: ProgramHandle) -> String {
            self.state.borrow().programs[&program.raw()].log.clone()
        }

        fn delete_program(&self, program: ProgramHandle) {
            self.state.borrow_mut().programs.remove(&program.raw());
        }
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_valid_sources_link() {
        let dir = tempfile::tempdir().unwrap();
        let vert = write_file(&dir, "ok.vert", VALID_VERT);
        let frag = write_file(&dir, "ok.frag", VALID_FRAG);
        let gl = FakeGl::default();

        let outcome = ShaderLoader::default()
            .load_detailed(&gl, &vert, &frag)
            .unwrap();

        assert!(outcome.program.is_some());
        assert!(outcome.succeeded());
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(gl.live_stages(), 0);
        assert_eq!(gl.live_programs(), 1);
    }

    #[test]
    fn test_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let vert = dir.path().join("missing.vert");
        let frag = write_file(&dir, "ok.frag", VALID_FRAG);
        let gl = FakeGl::default();

        assert_eq!(load_shaders(&gl, &vert, &frag), ProgramHandle::NONE);
        assert_eq!(gl.objects_created(), 0);

        let err = ShaderLoader::default()
            .load_detailed(&gl, &vert, &frag)
            .unwrap_err();
        match &err {
            LoadError::FileNotFound { path, .. } => assert_eq!(path, &vert),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("missing.vert"));
        assert_eq!(gl.objects_created(), 0);
    }

    #[test]
    fn test_missing_fragment_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let vert = write_file(&dir, "ok.vert", VALID_VERT);
        let frag = dir.path().join("missing.frag");
        let gl = FakeGl::default();

        assert!(load_shaders(&gl, &vert, &frag).is_none());
        assert_eq!(gl.objects_created(), 0);
    }

    #[test]
    fn test_repeated_loads_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let vert = write_file(&dir, "ok.vert", VALID_VERT);
        let frag = write_file(&dir, "ok.frag", VALID_FRAG);
        let gl = FakeGl::default();

        let first = load_shaders(&gl, &vert, &frag);
        let second = load_shaders(&gl, &vert, &frag);

        assert!(first.is_some());
        assert!(second.is_some());
        assert_ne!(first, second);
        assert_eq!(gl.live_programs(), 2);
        assert_eq!(gl.live_stages(), 0);
    }

    #[test]
    fn test_broken_vertex_lenient_still_returns_program() {
        let dir = tempfile::tempdir().unwrap();
        let vert = write_file(&dir, "bad.vert", BROKEN_VERT);
        let frag = write_file(&dir, "ok.frag", VALID_FRAG);
        let gl = FakeGl::default();

        let outcome = ShaderLoader::new(LoadPolicy::Lenient)
            .load_detailed(&gl, &vert, &frag)
            .unwrap();

        assert!(outcome.program.is_some());
        assert!(!outcome.vertex_compiled);
        assert!(outcome.fragment_compiled);
        assert!(!outcome.linked);
        assert!(matches!(
            &outcome.diagnostics[0],
            Diagnostic::CompileLog { stage: ShaderStage::Vertex, path, log }
                if path == &vert && log.contains("syntax error")
        ));
        assert!(matches!(&outcome.diagnostics[1], Diagnostic::LinkLog { .. }));
        assert_eq!(gl.live_stages(), 0);
    }

    #[test]
    fn test_broken_vertex_strict_discards_program() {
        let dir = tempfile::tempdir().unwrap();
        let vert = write_file(&dir, "bad.vert", BROKEN_VERT);
        let frag = write_file(&dir, "ok.frag", VALID_FRAG);
        let gl = FakeGl::default();

        let loader = ShaderLoader::new(LoadPolicy::Strict);
        let outcome = loader.load_detailed(&gl, &vert, &frag).unwrap();

        assert!(outcome.program.is_none());
        assert!(!outcome.diagnostics.is_empty());
        assert_eq!(gl.live_programs(), 0);
        assert_eq!(gl.live_stages(), 0);
        assert!(loader.load(&gl, &vert, &frag).is_none());
    }

    #[test]
    fn test_warnings_surface_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let vert = write_file(&dir, "ok.vert", VALID_VERT);
        let frag = write_file(&dir, "warn.frag", &format!("{VALID_FRAG}#warning unused\n"));
        let gl = FakeGl::default();

        let outcome = ShaderLoader::new(LoadPolicy::Strict)
            .load_detailed(&gl, &vert, &frag)
            .unwrap();

        assert!(outcome.succeeded());
        assert!(outcome.program.is_some());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(matches!(
            &outcome.diagnostics[0],
            Diagnostic::CompileLog { stage: ShaderStage::Fragment, log, .. } if log.contains("warning")
        ));
    }

    #[test]
    fn test_fragment_creation_failure_releases_vertex() {
        let dir = tempfile::tempdir().unwrap();
        let vert = write_file(&dir, "ok.vert", VALID_VERT);
        let frag = write_file(&dir, "ok.frag", VALID_FRAG);
        let gl = FakeGl::default();
        gl.refuse_stage.set(Some(ShaderStage::Fragment));

        let err = ShaderLoader::default()
            .load_detailed(&gl, &vert, &frag)
            .unwrap_err();
        assert!(matches!(err, LoadError::Backend(ref msg) if msg.contains("fragment")));
        assert_eq!(gl.live_stages(), 0);
        assert_eq!(gl.live_programs(), 0);

        assert!(load_shaders(&gl, &vert, &frag).is_none());
        assert_eq!(gl.live_stages(), 0);
    }

    #[test]
    fn test_program_creation_failure_releases_stages() {
        let dir = tempfile::tempdir().unwrap();
        let vert = write_file(&dir, "ok.vert", VALID_VERT);
        let frag = write_file(&dir, "ok.frag", VALID_FRAG);
        let gl = FakeGl::default();
        gl.refuse_program.set(true);

        let err = ShaderLoader::new(LoadPolicy::Strict)
            .load_detailed(&gl, &vert, &frag)
            .unwrap_err();
        assert!(matches!(err, LoadError::Backend(_)));
        assert_eq!(gl.objects_created(), 2);
        assert_eq!(gl.live_stages(), 0);

        assert!(load_shaders(&gl, &vert, &frag).is_none());
        assert_eq!(gl.live_stages(), 0);
        assert_eq!(gl.live_programs(), 0);
    }

    #[test]
    fn test_non_utf8_source_is_invalid_not_missing() {
        let dir = tempfile::tempdir().unwrap();
        let vert = dir.path().join("latin1.vert");
        std::fs::write(&vert, b"void main() { /* \xe9\xff */ }\n").unwrap();
        let frag = write_file(&dir, "ok.frag", VALID_FRAG);
        let gl = FakeGl::default();

        let err = ShaderLoader::default()
            .load_detailed(&gl, &vert, &frag)
            .unwrap_err();
        assert!(matches!(&err, LoadError::InvalidSource { path, .. } if path == &vert));
        assert!(err.to_string().starts_with("cannot read shader source"));
        assert!(load_shaders(&gl, &vert, &frag).is_none());
        assert_eq!(gl.objects_created(), 0);
    }

    #[test]
    fn test_read_source_prefixes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "lines.glsl", "a\nb\r\nc\n");
        assert_eq!(read_source(&path).unwrap(), "\na\nb\nc");

        let empty = write_file(&dir, "empty.glsl", "");
        assert_eq!(read_source(&empty).unwrap(), "");
    }

    #[test]
    fn test_program_handle_sentinel() {
        assert!(ProgramHandle::NONE.is_none());
        assert_eq!(ProgramHandle::default(), ProgramHandle::NONE);
        assert!(ProgramHandle::NONE.native().is_none());
        assert_eq!(ProgramHandle::from_raw(7).native().map(|p| p.0.get()), Some(7));
    }

    #[test]
    fn test_load_policy_serde() {
        assert_eq!(
            serde_json::from_str::<LoadPolicy>("\"strict\"").unwrap(),
            LoadPolicy::Strict
        );
        assert_eq!(serde_json::to_string(&LoadPolicy::Lenient).unwrap(), "\"lenient\"");
    }
}
