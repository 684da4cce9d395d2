//! GLSL 4.50 generator.
//!
//! Emits `#version 450`, maps HLSL resource/semantic/intrinsic spellings to
//! their GLSL equivalents, and marshals the entry point's stage I/O through
//! `in`/`out` globals (or the stage's built-ins) into a plain `void main()`.

use super::{cw_write, CodeWriter, GenOptions, ShaderStage};
use crate::ast::*;
use crate::error::CodegenError;
use crate::string_pool::{StringPool, Symbol};
use crate::types::{ArrayDim, BaseKind, BufferKind, ElementKind, NumericType, TextureAccess, Type};
use std::collections::{HashMap, HashSet};

pub fn generate(
    module: &Module,
    pool: &StringPool,
    options: &GenOptions,
    entry: Symbol,
    stage: ShaderStage,
) -> (String, Vec<CodegenError>) {
    let mut gen = Generator {
        module,
        pool,
        out: CodeWriter::new(),
        errors: Vec::new(),
        options,
        entry,
        stage,
        extensions: HashSet::new(),
        renames: HashMap::new(),
        out_vars: Vec::new(),
        binding_counter: 0,
        texture_sampler_pairs: HashMap::new(),
        samplers_consumed: HashSet::new(),
    };
    gen.collect_texture_sampler_pairs();
    gen.collect_extensions();
    gen.run();
    (gen.out.finish(), gen.errors)
}

/// `(builtin output GLSL destination, source value)` recorded while walking
/// the entry's return type so every `return` site can be rewritten in one
/// pass (`emit_statement`'s `Return` arm).
struct OutVar {
    glsl_name: String,
    /// `.field` path from the returned value down to this output, empty for
    /// a bare scalar/vector return.
    field_path: Vec<Symbol>,
}

struct Generator<'a> {
    module: &'a Module,
    pool: &'a StringPool,
    out: CodeWriter,
    errors: Vec<CodegenError>,
    options: &'a GenOptions,
    entry: Symbol,
    stage: ShaderStage,
    extensions: HashSet<&'static str>,
    /// Identifier rename table (e.g. an `SV_VertexID` argument becomes
    /// `gl_VertexIndex` at every reference, not just its declaration).
    renames: HashMap<Symbol, String>,
    out_vars: Vec<OutVar>,
    binding_counter: u32,
    /// `texture name -> paired sampler name`, detected from `.Sample(s, uv)`
    /// call sites so the pair can collapse into one `sampler2D`.
    texture_sampler_pairs: HashMap<Symbol, Symbol>,
    samplers_consumed: HashSet<Symbol>,
}

impl<'a> Generator<'a> {
    fn resolve(&self, sym: Symbol) -> &'a str {
        self.pool.resolve(sym)
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.errors.push(CodegenError { message: message.into() });
    }

    /// Scans every function body for `texture.Sample(sampler, uv)`-shaped
    /// call sites, grounding the paired-declaration rewrite named in the
    /// component design (see `DESIGN.md`: a static scan stands in for the
    /// reference's parser-time flag since this parser doesn't track it).
    fn collect_texture_sampler_pairs(&mut self) {
        for id in self.module.statements() {
            if let StatementKind::Function(f) = &self.module.statements[id].kind {
                if let Some(body) = self.module.functions[*f].body {
                    self.scan_statement_for_sample_calls(body);
                }
            }
        }
    }

    fn scan_statement_for_sample_calls(&mut self, root: Id<Statement>) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            match &self.module.statements[id].kind {
                StatementKind::Block(Some(first)) => {
                    let mut cursor = Some(*first);
                    while let Some(c) = cursor {
                        stack.push(c);
                        cursor = self.module.statements[c].next;
                    }
                }
                StatementKind::Expression(e) => self.scan_expr_for_sample_calls(*e),
                StatementKind::Return(Some(e)) => self.scan_expr_for_sample_calls(*e),
                StatementKind::Declaration(d) => {
                    if let Some(a) = d.assignment {
                        self.scan_expr_for_sample_calls(a);
                    }
                    let mut next = d.next_declaration.as_deref();
                    while let Some(more) = next {
                        if let Some(a) = more.assignment {
                            self.scan_expr_for_sample_calls(a);
                        }
                        next = more.next_declaration.as_deref();
                    }
                }
                StatementKind::If(s) => {
                    if let Some(b) = s.then_branch {
                        stack.push(b);
                    }
                    for (_, b) in &s.else_ifs {
                        if let Some(b) = b {
                            stack.push(*b);
                        }
                    }
                    if let Some(b) = s.else_branch {
                        stack.push(b);
                    }
                }
                StatementKind::For(s) => {
                    if let Some(b) = s.body {
                        stack.push(b);
                    }
                }
                StatementKind::While(s) => {
                    if let Some(b) = s.body {
                        stack.push(b);
                    }
                }
                _ => {}
            }
        }
    }

    fn scan_expr_for_sample_calls(&mut self, id: Id<Expr>) {
        let mut work = vec![id];
        while let Some(id) = work.pop() {
            let kind = self.module.exprs[id].kind.clone();
            if let ExprKind::MemberAccess { object, field, is_function_call: true, function_call: Some(args), .. } =
                &kind
            {
                let field_text = self.resolve(*field);
                if field_text.starts_with("Sample") {
                    if let (
                        ExprKind::Identifier { name: tex_name, .. },
                        ExprKind::Identifier { name: sampler_name, .. },
                    ) = (&self.module.exprs[*object].kind, &self.module.exprs[*args].kind)
                    {
                        self.texture_sampler_pairs.insert(*tex_name, *sampler_name);
                        self.samplers_consumed.insert(*sampler_name);
                    }
                }
            }
            match kind {
                ExprKind::Unary { operand, .. } => work.push(operand),
                ExprKind::Binary { lhs, rhs, .. } => {
                    work.push(lhs);
                    work.push(rhs);
                }
                ExprKind::Conditional { condition, if_true, if_false } => {
                    work.push(condition);
                    work.push(if_true);
                    work.push(if_false);
                }
                ExprKind::Cast { operand, .. } => work.push(operand),
                ExprKind::Constructor { args, .. } => work.extend(chain(self.module, args)),
                ExprKind::MemberAccess { object, function_call, .. } => {
                    work.push(object);
                    work.extend(chain(self.module, function_call));
                }
                ExprKind::ArrayAccess { array, index } => {
                    work.push(array);
                    work.push(index);
                }
                ExprKind::FunctionCall { args, .. } => work.extend(chain(self.module, args)),
                _ => {}
            }
        }
    }

    fn collect_extensions(&mut self) {
        for id in self.module.statements() {
            let stmt = &self.module.statements[id];
            if stmt.hidden {
                continue;
            }
            if let StatementKind::TextureState(t) = &stmt.kind {
                if matches!(t.texture_type.access, TextureAccess::ReadOnly)
                    && !self.texture_sampler_pairs.contains_key(&stmt.name)
                {
                    self.extensions.insert("GL_EXT_samplerless_texture_functions");
                }
            }
            if let StatementKind::Function(f) = &stmt.kind {
                if let Some(body) = self.module.functions[*f].body {
                    self.collect_extensions_in_statement(body);
                }
            }
        }
    }

    fn collect_extensions_in_statement(&mut self, root: Id<Statement>) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            match &self.module.statements[id].kind {
                StatementKind::Block(Some(first)) => {
                    let mut cursor = Some(*first);
                    while let Some(c) = cursor {
                        stack.push(c);
                        cursor = self.module.statements[c].next;
                    }
                }
                StatementKind::Expression(e) => self.collect_extensions_in_expr(*e),
                StatementKind::Return(Some(e)) => self.collect_extensions_in_expr(*e),
                StatementKind::Declaration(d) => {
                    if let Some(a) = d.assignment {
                        self.collect_extensions_in_expr(a);
                    }
                    let mut next = d.next_declaration.as_deref();
                    while let Some(more) = next {
                        if let Some(a) = more.assignment {
                            self.collect_extensions_in_expr(a);
                        }
                        next = more.next_declaration.as_deref();
                    }
                }
                StatementKind::If(s) => {
                    if let Some(b) = s.then_branch {
                        stack.push(b);
                    }
                    if let Some(b) = s.else_branch {
                        stack.push(b);
                    }
                }
                StatementKind::For(s) => {
                    if let Some(b) = s.body {
                        stack.push(b);
                    }
                }
                StatementKind::While(s) => {
                    if let Some(b) = s.body {
                        stack.push(b);
                    }
                }
                _ => {}
            }
        }
    }

    fn collect_extensions_in_expr(&mut self, id: Id<Expr>) {
        let mut work = vec![id];
        while let Some(id) = work.pop() {
            let kind = self.module.exprs[id].kind.clone();
            if let ExprKind::FunctionCall { callee_name, .. } = &kind {
                let name = self.resolve(*callee_name);
                if name.starts_with("Wave") || name.starts_with("Quad") {
                    self.extensions.insert("GL_KHR_shader_subgroup_basic");
                    self.extensions.insert("GL_KHR_shader_subgroup_arithmetic");
                    self.extensions.insert("GL_KHR_shader_subgroup_ballot");
                    self.extensions.insert("GL_KHR_shader_subgroup_quad");
                }
                if name == "NonUniformResourceIndex" {
                    self.extensions.insert("GL_EXT_nonuniform_qualifier");
                }
            }
            match kind {
                ExprKind::Unary { operand, .. } => work.push(operand),
                ExprKind::Binary { lhs, rhs, .. } => {
                    work.push(lhs);
                    work.push(rhs);
                }
                ExprKind::Conditional { condition, if_true, if_false } => {
                    work.push(condition);
                    work.push(if_true);
                    work.push(if_false);
                }
                ExprKind::Cast { operand, .. } => work.push(operand),
                ExprKind::Constructor { args, .. } => work.extend(chain(self.module, args)),
                ExprKind::MemberAccess { object, function_call, .. } => {
                    work.push(object);
                    work.extend(chain(self.module, function_call));
                }
                ExprKind::ArrayAccess { array, index } => {
                    work.push(array);
                    work.push(index);
                }
                ExprKind::FunctionCall { args, .. } => work.extend(chain(self.module, args)),
                _ => {}
            }
        }
    }

    fn run(&mut self) {
        self.out.write_line("#version 450");
        let mut exts: Vec<_> = self.extensions.iter().copied().collect();
        exts.sort_unstable();
        for ext in exts {
            self.out.write_line(&format!("#extension {ext} : require"));
        }
        self.out.blank_line();

        for id in self.module.statements() {
            if self.module.statements[id].hidden {
                continue;
            }
            let stmt = self.module.statements[id].clone();
            match &stmt.kind {
                StatementKind::Function(f) if stmt.name == self.entry => self.emit_entry(*f),
                StatementKind::Function(f) => self.emit_function(*f),
                StatementKind::Struct(s) => self.emit_struct(s, stmt.name),
                StatementKind::Buffer(b) => self.emit_buffer(b, stmt.name),
                StatementKind::Declaration(d) => self.emit_global_declaration(d, stmt.name),
                StatementKind::TextureState(t) => self.emit_texture_state(t, stmt.name),
                StatementKind::SamplerState(_) => {
                    if !self.samplers_consumed.contains(&stmt.name) {
                        let binding = self.next_binding();
                        cw_write!(self.out, "layout(binding = {binding}) uniform sampler {};", self.resolve(stmt.name));
                        self.out.end_line();
                    }
                }
                StatementKind::GroupShared(d) => {
                    let ty = self.type_name(&d.ty);
                    cw_write!(self.out, "shared {} {};", ty, self.resolve(stmt.name));
                    self.out.end_line();
                }
                StatementKind::Preprocessor(_) | StatementKind::Technique(_) | StatementKind::Pipeline(_) | StatementKind::Stage(_) => {}
                _ => self.fail(format!("unsupported top-level statement kind in GLSL generator: {:?}", stmt.kind)),
            }
        }
    }

    fn next_binding(&mut self) -> u32 {
        let slot = self.binding_counter;
        self.binding_counter += 1;
        slot
    }

    fn emit_struct(&mut self, s: &StructDecl, name: Symbol) {
        cw_write!(self.out, "struct {} {{", self.resolve(name));
        self.out.end_line();
        self.out.indent();
        for field in &s.fields {
            if field.hidden {
                continue;
            }
            let ty = self.type_name(&field.ty);
            cw_write!(self.out, "{} {};", ty, self.resolve(field.name));
            self.out.end_line();
        }
        self.out.dedent();
        self.out.write_line("};");
    }

    fn emit_buffer(&mut self, b: &BufferDecl, name: Symbol) {
        let binding = self.next_binding();
        match b.kind {
            BufferKind::CBuffer | BufferKind::TBuffer | BufferKind::ConstantBuffer => {
                cw_write!(self.out, "layout(std140, binding = {binding}) uniform {} {{", self.resolve(name));
                self.out.end_line();
                self.out.indent();
                for (field_name, field) in &b.fields {
                    let ty = self.type_name(&field.ty);
                    cw_write!(self.out, "{} {};", ty, self.resolve(*field_name));
                    self.out.end_line();
                }
                self.out.dedent();
                self.out.write_line("};");
            }
            _ => {
                let elem = b
                    .element_type
                    .as_ref()
                    .map(|t| self.type_name(t))
                    .or_else(|| b.user_defined_element_type.map(|s| self.resolve(s).to_string()))
                    .unwrap_or_else(|| "vec4".to_string());
                let qualifier = if b.kind.is_read_write() { "buffer" } else { "readonly buffer" };
                cw_write!(self.out, "layout(std430, binding = {binding}) {qualifier} {}Block {{", self.resolve(name));
                self.out.end_line();
                self.out.indent();
                cw_write!(self.out, "{elem} data[];");
                self.out.end_line();
                self.out.dedent();
                cw_write!(self.out, "}} {};", self.resolve(name));
                self.out.end_line();
            }
        }
    }

    fn emit_texture_state(&mut self, t: &TextureStateDecl, name: Symbol) {
        if let Some(&sampler) = self.texture_sampler_pairs.get(&name) {
            let binding = self.next_binding();
            let sampler_kind = combined_sampler_keyword(t.texture_type.shape);
            cw_write!(self.out, "layout(binding = {binding}) uniform {sampler_kind} {};", self.resolve(name));
            self.out.end_line();
            let _ = sampler;
            return;
        }
        let binding = self.next_binding();
        let keyword = texture_type_keyword(t.texture_type.shape);
        cw_write!(self.out, "layout(binding = {binding}) uniform {keyword} {};", self.resolve(name));
        self.out.end_line();
    }

    fn emit_global_declaration(&mut self, d: &Declaration, name: Symbol) {
        let ty = self.type_name(&d.ty);
        let assign = d
            .assignment
            .map(|a| format!(" = {}", self.expr_to_string(a)))
            .unwrap_or_default();
        cw_write!(self.out, "uniform {} {}{};", ty, self.resolve(name), assign);
        self.out.end_line();
        let mut next = d.next_declaration.as_deref();
        while let Some(more) = next {
            let assign = more.assignment.map(|a| format!(" = {}", self.expr_to_string(a))).unwrap_or_default();
            cw_write!(self.out, "uniform {} {}{};", ty, self.resolve(more.name), assign);
            self.out.end_line();
            next = more.next_declaration.as_deref();
        }
    }

    /// Non-entry functions carry over almost verbatim, modulo GLSL type
    /// names and intrinsic rewrites.
    fn emit_function(&mut self, func_id: Id<Function>) {
        let func = self.module.functions[func_id].clone();
        if func.hidden {
            return;
        }
        let ret = self.type_name(&func.return_type);
        let args: Vec<_> = func
            .arguments
            .iter()
            .filter(|a| !a.hidden)
            .map(|a| format!("{} {}", self.type_name(&a.ty), self.resolve(a.name)))
            .collect();
        cw_write!(self.out, "{} {}({})", ret, self.resolve(func.name), args.join(", "));
        match func.body {
            Some(body) => {
                self.out.end_line();
                self.emit_block_of(body);
            }
            None => self.out.write_line(";"),
        }
    }

    /// The entry point is rewritten into `void main()`: arguments become
    /// `in` globals (or stage built-ins), the return type's fields become
    /// `out` globals (or `gl_Position`), and every `return expr;` becomes an
    /// assignment to those outputs followed by a bare `return;`.
    fn emit_entry(&mut self, func_id: Id<Function>) {
        let func = self.module.functions[func_id].clone();
        let mut location = 0u32;

        for arg in func.arguments.iter().filter(|a| !a.hidden) {
            if let Some(builtin) = self.stage_input_builtin(arg.semantic) {
                self.renames.insert(arg.name, builtin);
                continue;
            }
            let ty = self.type_name(&arg.ty);
            cw_write!(self.out, "layout(location = {location}) in {ty} {};", self.resolve(arg.name));
            self.out.end_line();
            location += 1;
        }

        self.collect_out_vars(&func.return_type, func.semantic, func.sv_semantic, Vec::new(), &mut 0);

        self.out.blank_line();
        self.out.write_line("void main() {");
        self.out.indent();
        if let Some(body) = func.body {
            self.emit_block_contents(body);
        }
        self.out.dedent();
        self.out.write_line("}");
    }

    fn stage_input_builtin(&self, semantic: Option<Symbol>) -> Option<String> {
        let semantic = self.resolve(semantic?).to_ascii_uppercase();
        match (self.stage, semantic.as_str()) {
            (ShaderStage::Vertex, "SV_VERTEXID") => Some("gl_VertexIndex".to_string()),
            (ShaderStage::Vertex, "SV_INSTANCEID") => Some("gl_InstanceIndex".to_string()),
            (ShaderStage::Fragment, "SV_POSITION") => Some("gl_FragCoord".to_string()),
            (ShaderStage::Compute, "SV_DISPATCHTHREADID") => Some("gl_GlobalInvocationID".to_string()),
            _ => None,
        }
    }

    /// Walks the return type (recursing into struct fields) declaring one
    /// `out` global (or `gl_Position`) per leaf and recording its field path
    /// so `rewrite_return` can generate the matching assignment.
    fn collect_out_vars(
        &mut self,
        ty: &Type,
        semantic: Option<Symbol>,
        _sv_semantic: Option<Symbol>,
        field_path: Vec<Symbol>,
        location: &mut u32,
    ) {
        if let BaseKind::UserDefined(struct_name) = &ty.base {
            if let Some(decl) = find_struct(self.module, *struct_name) {
                for field in &decl.fields {
                    if field.hidden {
                        continue;
                    }
                    let mut path = field_path.clone();
                    path.push(field.name);
                    self.collect_out_vars(&field.ty, field.semantic, field.sv_semantic, path, location);
                }
                return;
            }
        }
        let semantic_upper = semantic.map(|s| self.resolve(s).to_ascii_uppercase());
        if semantic_upper.as_deref() == Some("SV_POSITION") && self.stage == ShaderStage::Vertex {
            self.out_vars.push(OutVar { glsl_name: "gl_Position".to_string(), field_path });
            return;
        }
        let glsl_name = match &semantic_upper {
            Some(s) if s.starts_with("SV_TARGET") => format!("out_{}", s.to_ascii_lowercase()),
            Some(s) => format!("out_{}", s.to_ascii_lowercase()),
            None => format!("out_{}", *location),
        };
        let ty_name = self.type_name(ty);
        cw_write!(self.out, "layout(location = {}) out {ty_name} {glsl_name};", *location);
        self.out.end_line();
        *location += 1;
        self.out_vars.push(OutVar { glsl_name, field_path });
    }

    fn emit_block_of(&mut self, body: Id<Statement>) {
        if let StatementKind::Block(_) = &self.module.statements[body].kind {
            self.emit_statement(body);
        } else {
            self.out.write_line("{");
            self.out.indent();
            self.emit_statement(body);
            self.out.dedent();
            self.out.write_line("}");
        }
    }

    fn emit_block_contents(&mut self, body: Id<Statement>) {
        let first = match &self.module.statements[body].kind {
            StatementKind::Block(first) => *first,
            _ => Some(body),
        };
        let mut cursor = first;
        while let Some(id) = cursor {
            self.emit_statement(id);
            cursor = self.module.statements[id].next;
        }
    }

    fn emit_statement(&mut self, id: Id<Statement>) {
        let stmt = self.module.statements[id].clone();
        match &stmt.kind {
            StatementKind::Block(first) => {
                self.out.write_line("{");
                self.out.indent();
                let mut cursor = *first;
                while let Some(cid) = cursor {
                    self.emit_statement(cid);
                    cursor = self.module.statements[cid].next;
                }
                self.out.dedent();
                self.out.write_line("}");
            }
            StatementKind::Declaration(d) => {
                let ty = self.type_name(&d.ty);
                let assign = d.assignment.map(|a| format!(" = {}", self.expr_to_string(a))).unwrap_or_default();
                cw_write!(self.out, "{ty} {}{assign};", self.resolve(stmt.name));
                self.out.end_line();
                let mut next = d.next_declaration.as_deref();
                while let Some(more) = next {
                    let assign = more.assignment.map(|a| format!(" = {}", self.expr_to_string(a))).unwrap_or_default();
                    cw_write!(self.out, "{ty} {}{assign};", self.resolve(more.name));
                    self.out.end_line();
                    next = more.next_declaration.as_deref();
                }
            }
            StatementKind::Expression(e) => {
                let s = self.expr_to_string(*e);
                self.out.write_line(&format!("{s};"));
            }
            StatementKind::Return(value) => self.rewrite_return(*value),
            StatementKind::Discard => self.out.write_line("discard;"),
            StatementKind::Break => self.out.write_line("break;"),
            StatementKind::Continue => self.out.write_line("continue;"),
            StatementKind::If(s) => {
                let cond = self.expr_to_string(s.condition);
                cw_write!(self.out, "if ({cond})");
                self.out.end_line();
                self.emit_branch(s.then_branch);
                for (cond, branch) in &s.else_ifs {
                    let cond = self.expr_to_string(*cond);
                    cw_write!(self.out, "else if ({cond})");
                    self.out.end_line();
                    self.emit_branch(*branch);
                }
                if let Some(else_branch) = s.else_branch {
                    self.out.write_line("else");
                    self.emit_branch(Some(else_branch));
                }
            }
            StatementKind::For(s) => {
                let init = if let Some((name, d)) = &s.init_declaration {
                    let ty = self.type_name(&d.ty);
                    let assign = d.assignment.map(|a| format!(" = {}", self.expr_to_string(a))).unwrap_or_default();
                    format!("{ty} {}{assign}", self.resolve(*name))
                } else if let Some(e) = s.init_expression {
                    self.expr_to_string(e)
                } else {
                    String::new()
                };
                let cond = s.condition.map(|c| self.expr_to_string(c)).unwrap_or_default();
                let incr = s.increment.map(|c| self.expr_to_string(c)).unwrap_or_default();
                cw_write!(self.out, "for ({init}; {cond}; {incr})");
                self.out.end_line();
                self.emit_branch(s.body);
            }
            StatementKind::While(s) => {
                let cond = self.expr_to_string(s.condition);
                cw_write!(self.out, "while ({cond})");
                self.out.end_line();
                self.emit_branch(s.body);
            }
            StatementKind::Switch(s) => {
                let cond = s.condition.map(|c| self.expr_to_string(c)).unwrap_or_default();
                cw_write!(self.out, "switch ({cond}) {{");
                self.out.end_line();
                self.out.indent();
                for (value, body) in &s.cases {
                    let value = self.expr_to_string(*value);
                    cw_write!(self.out, "case {value}:");
                    self.out.end_line();
                    self.out.indent();
                    self.emit_branch(*body);
                    self.out.dedent();
                }
                if let Some(default) = s.default {
                    self.out.write_line("default:");
                    self.out.indent();
                    self.emit_branch(Some(default));
                    self.out.dedent();
                }
                self.out.dedent();
                self.out.write_line("}");
            }
            _ => {}
        }
    }

    fn emit_branch(&mut self, id: Option<Id<Statement>>) {
        match id {
            Some(id) => self.emit_statement(id),
            None => self.out.write_line(";"),
        }
    }

    fn rewrite_return(&mut self, value: Option<Id<Expr>>) {
        let Some(value) = value else {
            self.out.write_line("return;");
            return;
        };
        let value_str = self.expr_to_string(value);
        let out_vars: Vec<_> = self
            .out_vars
            .iter()
            .map(|v| (v.glsl_name.clone(), v.field_path.clone()))
            .collect();
        if out_vars.len() == 1 && out_vars[0].1.is_empty() {
            cw_write!(self.out, "{} = {value_str};", out_vars[0].0);
            self.out.end_line();
        } else {
            for (glsl_name, field_path) in &out_vars {
                let accessor: String = field_path.iter().map(|f| format!(".{}", self.resolve(*f))).collect();
                cw_write!(self.out, "{glsl_name} = {value_str}{accessor};");
                self.out.end_line();
            }
        }
        self.out.write_line("return;");
    }

    fn type_name(&self, ty: &Type) -> String {
        let base = match &ty.base {
            BaseKind::Void => "void".to_string(),
            BaseKind::Numeric(n) => glsl_numeric_type_name(*n),
            BaseKind::UserDefined(name) => self.resolve(*name).to_string(),
            _ => super::base_kind_name(&ty.base, |s| self.resolve(s).to_string()),
        };
        let dims = array_dims_suffix(&ty.array_dims);
        format!("{base}{dims}")
    }

    fn expr_to_string(&self, id: Id<Expr>) -> String {
        let expr = &self.module.exprs[id];
        match &expr.kind {
            ExprKind::Unary { op, operand } => {
                let operand_str = self.expr_to_string(*operand);
                match op {
                    UnaryOp::Negate => format!("-{operand_str}"),
                    UnaryOp::Not => format!("!{operand_str}"),
                    UnaryOp::BitNot => format!("~{operand_str}"),
                    UnaryOp::PreIncrement => format!("++{operand_str}"),
                    UnaryOp::PreDecrement => format!("--{operand_str}"),
                    UnaryOp::PostIncrement => format!("{operand_str}++"),
                    UnaryOp::PostDecrement => format!("{operand_str}--"),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                format!("({} {} {})", self.expr_to_string(*lhs), binary_op_str(*op), self.expr_to_string(*rhs))
            }
            ExprKind::Conditional { condition, if_true, if_false } => format!(
                "({} ? {} : {})",
                self.expr_to_string(*condition),
                self.expr_to_string(*if_true),
                self.expr_to_string(*if_false)
            ),
            ExprKind::Cast { ty, operand } => format!("{}({})", self.type_name(ty), self.expr_to_string(*operand)),
            ExprKind::Literal(lit) => literal_to_string(*lit),
            ExprKind::Identifier { name, array_dims, .. } => {
                let text = self.renames.get(name).cloned().unwrap_or_else(|| self.resolve(*name).to_string());
                format!("{text}{}", array_dims_value_suffix(self, array_dims))
            }
            ExprKind::Constructor { ty, args } => self.constructor_to_string(ty, *args),
            ExprKind::MemberAccess { object, field, function_call, is_function_call, .. } => {
                self.member_access_to_string(*object, *field, *function_call, *is_function_call)
            }
            ExprKind::ArrayAccess { array, index } => {
                format!("{}[{}]", self.expr_to_string(*array), self.expr_to_string(*index))
            }
            ExprKind::FunctionCall { callee_name, args, .. } => self.function_call_to_string(*callee_name, *args),
            ExprKind::SamplerState(_) => String::new(),
            ExprKind::TextureState { name, .. } => self.resolve(*name).to_string(),
            ExprKind::Preprocessor { contents, .. } => contents.map(|s| self.resolve(s).to_string()).unwrap_or_default(),
        }
    }

    fn arg_chain_string(&self, head: Option<Id<Expr>>) -> Vec<String> {
        let mut parts = Vec::new();
        let mut cursor = head;
        while let Some(id) = cursor {
            parts.push(self.expr_to_string(id));
            cursor = self.module.exprs[id].next;
        }
        parts
    }

    fn member_access_to_string(
        &self,
        object: Id<Expr>,
        field: Symbol,
        function_call: Option<Id<Expr>>,
        is_function_call: bool,
    ) -> String {
        let obj = self.expr_to_string(object);
        let field_text = self.resolve(field);
        if is_function_call && field_text.starts_with("Sample") {
            let mut args = self.arg_chain_string(function_call);
            if !args.is_empty() {
                args.remove(0);
            }
            return format!("texture({obj}, {})", args.join(", "));
        }
        if is_function_call {
            let args = self.arg_chain_string(function_call);
            return format!("{obj}.{field_text}({})", args.join(", "));
        }
        format!("{obj}.{field_text}")
    }

    fn function_call_to_string(&self, callee_name: Symbol, args: Option<Id<Expr>>) -> String {
        let name = self.resolve(callee_name);
        let arg_strs = self.arg_chain_string(args);
        match name {
            "mul" if arg_strs.len() == 2 => format!("({} * {})", arg_strs[0], arg_strs[1]),
            "lerp" => format!("mix({})", arg_strs.join(", ")),
            "frac" => format!("fract({})", arg_strs.join(", ")),
            "atan2" => format!("atan({})", arg_strs.join(", ")),
            "saturate" => format!("clamp({}, 0.0, 1.0)", arg_strs.join(", ")),
            "rsqrt" => format!("inversesqrt({})", arg_strs.join(", ")),
            "InterlockedAdd" if arg_strs.len() >= 2 => format!("atomicAdd({}, {})", arg_strs[0], arg_strs[1]),
            "ddx" => format!("dFdx({})", arg_strs.join(", ")),
            "ddy" => format!("dFdy({})", arg_strs.join(", ")),
            "NonUniformResourceIndex" => format!("nonuniformEXT({})", arg_strs.join(", ")),
            _ => format!("{name}({})", arg_strs.join(", ")),
        }
    }

    fn constructor_to_string(&self, ty: &Type, args: Option<Id<Expr>>) -> String {
        let type_name = self.type_name(ty);
        if let BaseKind::Numeric(n) = &ty.base {
            if n.is_matrix() {
                let arg_ids: Vec<_> = {
                    let mut v = Vec::new();
                    let mut cursor = args;
                    while let Some(id) = cursor {
                        v.push(id);
                        cursor = self.module.exprs[id].next;
                    }
                    v
                };
                if arg_ids.len() as u8 == n.rows {
                    let cols: Vec<String> = (0..n.cols)
                        .map(|c| {
                            let comps: Vec<String> = arg_ids
                                .iter()
                                .map(|row| format!("{}.{}", self.expr_to_string(*row), swizzle_letter(c)))
                                .collect();
                            format!("vec{}({})", n.rows, comps.join(", "))
                        })
                        .collect();
                    return format!("{type_name}({})", cols.join(", "));
                }
            }
        }
        format!("{type_name}({})", self.arg_chain_string(args).join(", "))
    }
}

fn chain(module: &Module, head: Option<Id<Expr>>) -> Vec<Id<Expr>> {
    let mut out = Vec::new();
    let mut cursor = head;
    while let Some(id) = cursor {
        out.push(id);
        cursor = module.exprs[id].next;
    }
    out
}

fn find_struct(module: &Module, name: Symbol) -> Option<StructDecl> {
    for id in module.statements() {
        if let StatementKind::Struct(s) = &module.statements[id].kind {
            if module.statements[id].name == name {
                return Some(s.clone());
            }
        }
    }
    None
}

fn swizzle_letter(index: u8) -> char {
    match index {
        0 => 'x',
        1 => 'y',
        2 => 'z',
        _ => 'w',
    }
}

fn literal_to_string(lit: Literal) -> String {
    match lit {
        Literal::Bool(b) => b.to_string(),
        Literal::Int(i) => i.to_string(),
        Literal::Uint(u) => format!("{u}u"),
        Literal::Float(f) => {
            if f.fract() == 0.0 {
                format!("{f:.1}")
            } else {
                f.to_string()
            }
        }
    }
}

fn binary_op_str(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::LogicalAnd => "&&",
        BinaryOp::LogicalOr => "||",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Gt => ">",
        BinaryOp::Le => "<=",
        BinaryOp::Ge => ">=",
        BinaryOp::Assign => "=",
        BinaryOp::AddAssign => "+=",
        BinaryOp::SubAssign => "-=",
        BinaryOp::MulAssign => "*=",
        BinaryOp::DivAssign => "/=",
        BinaryOp::AndAssign => "&=",
        BinaryOp::OrAssign => "|=",
        BinaryOp::XorAssign => "^=",
    }
}

fn glsl_numeric_type_name(n: NumericType) -> String {
    let prefix = match n.elem {
        ElementKind::Bool => "b",
        ElementKind::Int => "i",
        ElementKind::Uint => "u",
        _ => "",
    };
    if n.is_scalar() {
        match n.elem {
            ElementKind::Bool => "bool".to_string(),
            ElementKind::Int => "int".to_string(),
            ElementKind::Uint => "uint".to_string(),
            _ => "float".to_string(),
        }
    } else if n.is_vector() {
        format!("{prefix}vec{}", n.rows)
    } else if n.rows == n.cols {
        format!("mat{}", n.rows)
    } else {
        format!("mat{}x{}", n.cols, n.rows)
    }
}

fn texture_type_keyword(shape: crate::types::TextureShape) -> &'static str {
    use crate::types::TextureShape::*;
    match shape {
        Tex1D => "texture1D",
        Tex1DArray => "texture1DArray",
        Tex2D => "texture2D",
        Tex2DArray => "texture2DArray",
        Tex3D => "texture3D",
        Tex2DMS => "texture2DMS",
        Tex2DMSArray => "texture2DMSArray",
        Cube => "textureCube",
        CubeArray => "textureCubeArray",
    }
}

fn combined_sampler_keyword(shape: crate::types::TextureShape) -> &'static str {
    use crate::types::TextureShape::*;
    match shape {
        Tex1D => "sampler1D",
        Tex1DArray => "sampler1DArray",
        Tex2D => "sampler2D",
        Tex2DArray => "sampler2DArray",
        Tex3D => "sampler3D",
        Tex2DMS => "sampler2DMS",
        Tex2DMSArray => "sampler2DMSArray",
        Cube => "samplerCube",
        CubeArray => "samplerCubeArray",
    }
}

fn array_dims_suffix(dims: &[ArrayDim]) -> String {
    let mut s = String::new();
    for dim in dims {
        match dim {
            ArrayDim::Literal(n) => s.push_str(&format!("[{n}]")),
            ArrayDim::Ident(_) | ArrayDim::Unsized => s.push_str("[]"),
        }
    }
    s
}

fn array_dims_value_suffix(gen: &Generator<'_>, dims: &ArrayDims) -> String {
    let mut s = String::new();
    for dim in &dims.dims {
        match dim {
            ArrayDimValue::Literal(n) => s.push_str(&format!("[{n}]")),
            ArrayDimValue::Identifier(id) => s.push_str(&format!("[{}]", gen.resolve(*id))),
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intrinsics::IntrinsicTable;
    use crate::parser::Parser;
    use crate::token_buffer::TokenBuffer;
    use crate::tokenizer::Tokenizer;

    fn compile(source: &str) -> (Module, StringPool) {
        let mut pool = StringPool::new();
        let file = pool.intern("t.hlsl");
        let tokenizer = Tokenizer::new(source, file, 1, &pool);
        let buffer = TokenBuffer::drain(tokenizer, &mut pool, file);
        let intrinsics = IntrinsicTable::build(&mut pool);
        let module = Parser::parse(buffer, &mut pool, &intrinsics).expect("parses");
        (module, pool)
    }

    #[test]
    fn vertex_entry_marshals_position_semantic_to_gl_position() {
        let (module, mut pool) = compile("float4 main(float4 pos : POSITION) : SV_Position { return pos; }");
        let entry = pool.intern("main");
        let options = GenOptions::default();
        let (text, errors) = generate(&module, &pool, &options, entry, ShaderStage::Vertex);
        assert!(errors.is_empty());
        assert!(text.contains("#version 450"));
        assert!(text.contains("layout(location = 0) in vec4 pos;"));
        assert!(text.contains("void main()"));
        assert!(text.contains("gl_Position = pos;"));
    }

    #[test]
    fn mul_lerp_and_frac_intrinsics_are_rewritten() {
        let (module, mut pool) = compile(
            "float4 main(float4 a : A, float4 b : B, float4x4 m : M) : SV_Target {\n\
             float4 x = mul(m, a);\n\
             float4 y = lerp(a, b, 0.5);\n\
             float z = frac(0.5);\n\
             return x + y + z;\n\
             }",
        );
        let entry = pool.intern("main");
        let options = GenOptions::default();
        let (text, errors) = generate(&module, &pool, &options, entry, ShaderStage::Fragment);
        assert!(errors.is_empty());
        assert!(text.contains("(m * a)"));
        assert!(text.contains("mix(a, b, 0.5)"));
        assert!(text.contains("fract(0.5)"));
    }
}
