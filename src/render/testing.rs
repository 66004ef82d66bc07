//! Counting stand-in for a GL context, used by the unit tests.
//!
//! It keeps every live shader and program in a table so tests can check that
//! nothing leaks, and it fakes just enough of a GLSL front end to tell a
//! syntax error from an interface mismatch:
//! - compile fails on unbalanced `()`/`{}` or a missing `main`;
//! - link fails when a fragment `in` has no vertex `out` of the same name, or
//!   when the fragment stage assigns to a name it never declared.

use crate::render::backend::{ShaderBackend, Uniform};
use crate::render::shaders::ShaderStage;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

const QUALIFIERS: &[&str] = &["in", "out", "uniform"];
const TYPES: &[&str] = &[
    "bool", "int", "uint", "float", "vec2", "vec3", "vec4", "ivec2", "ivec3", "ivec4", "uvec2",
    "uvec3", "uvec4", "mat2", "mat3", "mat4", "sampler2D",
];

#[derive(Debug)]
struct MockShader {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Default)]
struct MockProgram {
    attached: Vec<u32>,
    uniforms: Vec<String>,
    linked: bool,
    log: String,
}

#[derive(Debug, Default)]
struct State {
    next_id: u32,
    shaders: HashMap<u32, MockShader>,
    programs: HashMap<u32, MockProgram>,
    submitted: Vec<ShaderStage>,
    validation_failure: Option<String>,
    compile_log: Option<String>,
    refuse_objects: bool,
    refuse_programs: bool,
    uniform_lookups: usize,
    uniform_uploads: usize,
    current_program: Option<u32>,
}

impl State {
    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct MockBackend {
    state: RefCell<State>,
}

impl MockBackend {
    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn live_handles(&self) -> usize {
        self.live_shaders() + self.live_programs()
    }

    /// Stages in the order their source reached the compiler.
    pub fn submitted_stages(&self) -> Vec<ShaderStage> {
        self.state.borrow().submitted.clone()
    }

    pub fn fail_validation(&self, log: &str) {
        self.state.borrow_mut().validation_failure = Some(log.to_string());
    }

    /// Replaces the log text reported for failed compiles.
    pub fn set_compile_log(&self, log: &str) {
        self.state.borrow_mut().compile_log = Some(log.to_string());
    }

    pub fn refuse_objects(&self) {
        self.state.borrow_mut().refuse_objects = true;
    }

    /// Shaders still allocate; only program creation fails.
    pub fn refuse_programs(&self) {
        self.state.borrow_mut().refuse_programs = true;
    }

    pub fn uniform_lookups(&self) -> usize {
        self.state.borrow().uniform_lookups
    }

    pub fn uniform_uploads(&self) -> usize {
        self.state.borrow().uniform_uploads
    }
}

fn statements(source: &str) -> Vec<String> {
    source
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .split(|c: char| c == ';' || c == '{' || c == '}')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn tokens(statement: &str) -> Vec<&str> {
    statement
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .collect()
}

/// `(qualifier, name)` for every `in`/`out`/`uniform` declaration.
fn interface(source: &str) -> Vec<(String, String)> {
    let mut found = Vec::new();
    for statement in statements(source) {
        let toks = tokens(&statement);
        if let Some(q) = toks.iter().position(|t| QUALIFIERS.contains(t)) {
            if let Some(name) = toks.get(q + 2) {
                found.push((toks[q].to_string(), name.to_string()));
            }
        }
    }
    found
}

fn locals(source: &str) -> HashSet<String> {
    statements(source)
        .iter()
        .filter_map(|statement| {
            let toks = tokens(statement);
            match toks.as_slice() {
                [ty, name, ..] if TYPES.contains(ty) => Some(name.to_string()),
                _ => None,
            }
        })
        .collect()
}

fn assignment_target(statement: &str) -> Option<&str> {
    let end = statement
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(statement.len());
    let (name, rest) = statement.split_at(end);
    let rest = rest.trim_start();
    if name.is_empty() || !rest.starts_with('=') || rest.starts_with("==") {
        return None;
    }
    Some(name)
}

fn syntax_ok(source: &str) -> bool {
    let mut parens = 0i32;
    let mut braces = 0i32;
    for c in source.chars() {
        match c {
            '(' => parens += 1,
            ')' => parens -= 1,
            '{' => braces += 1,
            '}' => braces -= 1,
            _ => {}
        }
        if parens < 0 || braces < 0 {
            return false;
        }
    }
    parens == 0 && braces == 0 && source.contains("main")
}

fn link_errors(vertex: &str, fragment: &str) -> Vec<String> {
    let vertex_outs: HashSet<String> = interface(vertex)
        .into_iter()
        .filter(|(q, _)| q == "out")
        .map(|(_, n)| n)
        .collect();
    let fragment_decls = interface(fragment);
    let mut declared: HashSet<String> = fragment_decls.iter().map(|(_, n)| n.clone()).collect();
    declared.extend(locals(fragment));

    let mut errors = Vec::new();
    for (qualifier, name) in &fragment_decls {
        if qualifier == "in" && !vertex_outs.contains(name) {
            errors.push(format!(
                "error: fragment shader input '{name}' is not written by the vertex shader"
            ));
        }
    }
    for statement in statements(fragment) {
        if let Some(target) = assignment_target(&statement) {
            if !target.starts_with("gl_") && !declared.contains(target) {
                errors.push(format!("error: '{target}' : undeclared output variable"));
            }
        }
    }
    errors
}

impl ShaderBackend for MockBackend {
    type Shader = u32;
    type Program = u32;
    type UniformLocation = i32;

    fn create_shader(&self, stage: ShaderStage) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        if state.refuse_objects {
            return Err("out of memory".to_string());
        }
        let id = state.allocate();
        state.shaders.insert(
            id,
            MockShader {
                stage,
                source: String::new(),
                compiled: false,
                log: String::new(),
            },
        );
        Ok(id)
    }

    fn shader_source(&self, shader: u32, source: &str) {
        let mut state = self.state.borrow_mut();
        let stage = {
            let entry = state.shaders.get_mut(&shader).expect("unknown shader");
            entry.source = source.to_string();
            entry.stage
        };
        state.submitted.push(stage);
    }

    fn compile_shader(&self, shader: u32) {
        let mut state = self.state.borrow_mut();
        let override_log = state.compile_log.clone();
        let entry = state.shaders.get_mut(&shader).expect("unknown shader");
        entry.compiled = syntax_ok(&entry.source);
        if !entry.compiled {
            let line = entry.source.lines().count().max(1);
            entry.log = override_log.unwrap_or_else(|| {
                format!("ERROR: 0:{line}: '' : syntax error: unexpected end of file\n")
            });
        }
    }

    fn compile_status(&self, shader: u32) -> bool {
        self.state.borrow().shaders[&shader].compiled
    }

    fn shader_info_log(&self, shader: u32) -> String {
        self.state.borrow().shaders[&shader].log.clone()
    }

    fn delete_shader(&self, shader: u32) {
        let removed = self.state.borrow_mut().shaders.remove(&shader);
        assert!(removed.is_some(), "shader {shader} deleted twice");
    }

    fn create_program(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        if state.refuse_objects || state.refuse_programs {
            return Err("out of memory".to_string());
        }
        let id = state.allocate();
        state.programs.insert(id, MockProgram::default());
        Ok(id)
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        let mut state = self.state.borrow_mut();
        assert!(state.shaders.contains_key(&shader), "attaching dead shader");
        state
            .programs
            .get_mut(&program)
            .expect("unknown program")
            .attached
            .push(shader);
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        let mut state = self.state.borrow_mut();
        let entry = state.programs.get_mut(&program).expect("unknown program");
        entry.attached.retain(|s| *s != shader);
    }

    fn link_program(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        let attached = state.programs[&program].attached.clone();
        let source_of = |stage: ShaderStage| {
            attached
                .iter()
                .map(|id| &state.shaders[id])
                .find(|s| s.stage == stage && s.compiled)
                .map(|s| s.source.clone())
        };

        let (linked, log, uniforms) = match (
            source_of(ShaderStage::Vertex),
            source_of(ShaderStage::Fragment),
        ) {
            (Some(vertex), Some(fragment)) => {
                let errors = link_errors(&vertex, &fragment);
                let uniforms = interface(&vertex)
                    .into_iter()
                    .chain(interface(&fragment))
                    .filter(|(q, _)| q == "uniform")
                    .map(|(_, n)| n)
                    .collect();
                (errors.is_empty(), errors.join("\n"), uniforms)
            }
            _ => (
                false,
                "error: program needs a compiled vertex and fragment shader".to_string(),
                Vec::new(),
            ),
        };

        let entry = state.programs.get_mut(&program).expect("unknown program");
        entry.linked = linked;
        entry.log = log;
        entry.uniforms = uniforms;
    }

    fn link_status(&self, program: u32) -> bool {
        self.state.borrow().programs[&program].linked
    }

    fn validate_program(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        let failure = state.validation_failure.clone();
        if let Some(log) = failure {
            state.programs.get_mut(&program).expect("unknown program").log = log;
        }
    }

    fn validate_status(&self, program: u32) -> bool {
        let state = self.state.borrow();
        state.programs[&program].linked && state.validation_failure.is_none()
    }

    fn program_info_log(&self, program: u32) -> String {
        self.state.borrow().programs[&program].log.clone()
    }

    fn delete_program(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        assert!(
            state.programs.remove(&program).is_some(),
            "program {program} deleted twice"
        );
        if state.current_program == Some(program) {
            state.current_program = None;
        }
    }

    fn use_program(&self, program: Option<u32>) {
        self.state.borrow_mut().current_program = program;
    }

    fn uniform_location(&self, program: u32, name: &str) -> Option<i32> {
        let mut state = self.state.borrow_mut();
        state.uniform_lookups += 1;
        state.programs[&program]
            .uniforms
            .iter()
            .position(|u| u == name)
            .map(|i| i as i32)
    }

    fn set_uniform(&self, _location: i32, _value: Uniform) {
        let mut state = self.state.borrow_mut();
        assert!(state.current_program.is_some(), "uniform upload with no bound program");
        state.uniform_uploads += 1;
    }
}
