//! Metal Shading Language generator.
//!
//! Metal's expression/statement grammar is close enough to HLSL's that the
//! bulk of `expr_to_string`/`emit_statement` mirrors `codegen::hlsl`; what's
//! genuinely different is resource binding: MSL has no free-standing global
//! resource declarations, so every `cbuffer`/`Texture2D`/`SamplerState` at
//! top level gets lifted into a parameter of the entry function, attributed
//! with `[[buffer(n)]]`/`[[texture(n)]]`/`[[sampler(n)]]` ("class-argument
//! lifting").

use super::{cw_write, BindingCounters, CodeWriter, GenOptions, ShaderStage};
use crate::ast::*;
use crate::error::CodegenError;
use crate::string_pool::{StringPool, Symbol};
use crate::types::{ArrayDim, BaseKind, BufferKind, NumericType, TextureAccess, Type};

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
        counters: BindingCounters::default(),
    };
    gen.run();
    (gen.out.finish(), gen.errors)
}

/// One global resource lifted into the entry function's trailing parameter
/// list. `param` is the full `Type Name [[attribute]]` text.
struct ClassArgument {
    param: String,
}

struct Generator<'a> {
    module: &'a Module,
    pool: &'a StringPool,
    out: CodeWriter,
    errors: Vec<CodegenError>,
    options: &'a GenOptions,
    entry: Symbol,
    stage: ShaderStage,
    counters: BindingCounters,
}

impl<'a> Generator<'a> {
    fn resolve(&self, sym: Symbol) -> &'a str {
        self.pool.resolve(sym)
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.errors.push(CodegenError { message: message.into() });
    }

    fn run(&mut self) {
        let ids: Vec<_> = self.module.statements().collect();
        let mut class_args = Vec::new();

        for &id in &ids {
            let stmt = self.module.statements[id].clone();
            if stmt.hidden {
                continue;
            }
            match &stmt.kind {
                StatementKind::Function(f) if stmt.name == self.entry => {}
                StatementKind::Function(f) => self.emit_function(*f),
                StatementKind::Struct(s) => self.emit_struct(s, stmt.name),
                StatementKind::Buffer(b) => {
                    if matches!(b.kind, BufferKind::CBuffer | BufferKind::TBuffer | BufferKind::ConstantBuffer) {
                        self.emit_cbuffer_struct(b, stmt.name);
                    }
                    class_args.push(self.class_argument_for_buffer(b, stmt.name));
                }
                StatementKind::TextureState(t) => class_args.push(self.class_argument_for_texture(t, stmt.name)),
                StatementKind::SamplerState(_) => {
                    let binding = self.counters.next_sampler();
                    class_args.push(ClassArgument { param: format!("sampler {} [[sampler({binding})]]", self.resolve(stmt.name)) });
                }
                StatementKind::Declaration(_) => {
                    self.fail(format!(
                        "loose global '{}' has no MSL class-argument form; wrap it in a cbuffer",
                        self.resolve(stmt.name)
                    ));
                }
                StatementKind::Preprocessor(_) | StatementKind::Technique(_) | StatementKind::Pipeline(_) | StatementKind::Stage(_) | StatementKind::GroupShared(_) => {}
                _ => self.fail(format!("unsupported top-level statement kind in MSL generator: {:?}", stmt.kind)),
            }
        }

        for &id in &ids {
            let stmt = self.module.statements[id].clone();
            if stmt.hidden {
                continue;
            }
            if let StatementKind::Function(f) = &stmt.kind {
                if stmt.name == self.entry {
                    self.emit_entry(*f, &class_args);
                }
            }
        }

        if self.options.bindings_required && class_args.is_empty() {
            // Nothing to bind; not itself an error, kept for symmetry with
            // the HLSL/GLSL generators' override-required checks.
        }
    }

    /// `constant T&` parameters need a concrete struct type to name; emit
    /// one under the cbuffer's own name before it's referenced as a
    /// class argument.
    fn emit_cbuffer_struct(&mut self, b: &BufferDecl, name: Symbol) {
        cw_write!(self.out, "struct {} {{", self.resolve(name));
        self.out.end_line();
        self.out.indent();
        for (field_name, field) in &b.fields {
            let ty = self.type_name(&field.ty);
            cw_write!(self.out, "{} {};", ty, self.resolve(*field_name));
            self.out.end_line();
        }
        self.out.dedent();
        self.out.write_line("};");
        self.out.blank_line();
    }

    fn class_argument_for_buffer(&mut self, b: &BufferDecl, name: Symbol) -> ClassArgument {
        let binding = self.counters.next_buffer();
        match b.kind {
            BufferKind::CBuffer | BufferKind::TBuffer | BufferKind::ConstantBuffer => {
                ClassArgument { param: format!("constant {}& {} [[buffer({binding})]]", self.resolve(name), self.resolve(name)) }
            }
            _ => {
                let elem = b
                    .element_type
                    .as_ref()
                    .map(|t| self.type_name(t))
                    .or_else(|| b.user_defined_element_type.map(|s| self.resolve(s).to_string()))
                    .unwrap_or_else(|| "float4".to_string());
                let qualifier = if b.kind.is_read_write() { "device" } else { "const device" };
                ClassArgument { param: format!("{qualifier} {elem}* {} [[buffer({binding})]]", self.resolve(name)) }
            }
        }
    }

    /// Metal's `texture2d<T, ...>` family takes the per-channel pixel
    /// component type (`float`, `half`, `int`, `uint`), never a vector —
    /// `Texture2D<float4>` lowers to `texture2d<float, ...>`, not
    /// `texture2d<float4, ...>` (§4.5.3 / scenario 3).
    fn texture_component_name(&self, ty: &Type) -> String {
        match &ty.base {
            BaseKind::Numeric(n) => super::element_kind_name(n.elem).to_string(),
            _ => self.type_name(ty),
        }
    }

    fn class_argument_for_texture(&mut self, t: &TextureStateDecl, name: Symbol) -> ClassArgument {
        let binding = self.counters.next_texture();
        let elem = self.texture_component_name(&t.element_type);
        let access = match t.texture_type.access {
            TextureAccess::ReadOnly => "access::read",
            TextureAccess::ReadWrite => "access::read_write",
            TextureAccess::RasterizerOrdered => "access::read_write",
        };
        let dims = texture_dims_keyword(t.texture_type.shape);
        ClassArgument { param: format!("{dims}<{elem}, {access}> {} [[texture({binding})]]", self.resolve(name)) }
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
        self.out.blank_line();
    }

    fn emit_function(&mut self, func_id: Id<Function>) {
        let func = self.module.functions[func_id].clone();
        if func.hidden {
            return;
        }
        if let Some(body) = func.body {
            self.check_references_lifted_resources(body);
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
        self.out.blank_line();
    }

    /// Helper functions emitted verbatim can't see the entry's lifted
    /// class arguments; flag it (best-effort emission continues) rather
    /// than silently producing code Metal would reject.
    fn check_references_lifted_resources(&mut self, root: Id<Statement>) {
        let mut names = Vec::new();
        for id in self.module.statements() {
            let stmt = &self.module.statements[id];
            match &stmt.kind {
                StatementKind::Buffer(_) | StatementKind::TextureState(_) | StatementKind::SamplerState(_) => {
                    names.push(stmt.name)
                }
                _ => {}
            }
        }
        if names.is_empty() {
            return;
        }
        let mut stack = vec![root];
        let mut referenced = None;
        while let Some(id) = stack.pop() {
            let kind = self.module.statements[id].kind.clone();
            match &kind {
                StatementKind::Block(Some(first)) => {
                    let mut cursor = Some(*first);
                    while let Some(c) = cursor {
                        stack.push(c);
                        cursor = self.module.statements[c].next;
                    }
                }
                StatementKind::Expression(e) => referenced = referenced.or(self.find_reference(*e, &names)),
                StatementKind::Return(Some(e)) => referenced = referenced.or(self.find_reference(*e, &names)),
                StatementKind::Declaration(d) => {
                    if let Some(a) = d.assignment {
                        referenced = referenced.or(self.find_reference(a, &names));
                    }
                    let mut next = d.next_declaration.as_deref();
                    while let Some(more) = next {
                        if let Some(a) = more.assignment {
                            referenced = referenced.or(self.find_reference(a, &names));
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
            if referenced.is_some() {
                break;
            }
        }
        if let Some(name) = referenced {
            self.fail(format!(
                "helper function references global resource '{}' directly; MSL class-argument threading across calls isn't modeled",
                self.resolve(name)
            ));
        }
    }

    fn find_reference(&self, id: Id<Expr>, names: &[Symbol]) -> Option<Symbol> {
        let mut work = vec![id];
        while let Some(id) = work.pop() {
            let kind = self.module.exprs[id].kind.clone();
            if let ExprKind::Identifier { name, .. } = &kind {
                if names.contains(name) {
                    return Some(*name);
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
        None
    }

    fn emit_entry(&mut self, func_id: Id<Function>, class_args: &[ClassArgument]) {
        let func = self.module.functions[func_id].clone();
        let qualifier = match self.stage {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "kernel",
            ShaderStage::Hull | ShaderStage::Domain | ShaderStage::Geometry => {
                self.fail(format!("MSL has no direct equivalent for this shader stage; emitting as a compute-style kernel"));
                "kernel"
            }
        };

        let mut params: Vec<String> = func
            .arguments
            .iter()
            .filter(|a| !a.hidden)
            .map(|a| self.entry_argument_string(a))
            .collect();
        params.extend(class_args.iter().map(|c| c.param.clone()));

        let ret = self.type_name(&func.return_type);
        let ret_attr = self.return_attribute(func.semantic, func.sv_semantic, &func.return_type);
        cw_write!(self.out, "{qualifier} {ret} {}({}){ret_attr}", self.resolve(func.name), params.join(", "));
        match func.body {
            Some(body) => {
                self.out.end_line();
                self.emit_block_of(body);
            }
            None => self.out.write_line(";"),
        }
    }

    fn entry_argument_string(&mut self, a: &Argument) -> String {
        let ty = self.type_name(&a.ty);
        let attr = self.input_attribute(a.semantic.or(a.sv_semantic));
        format!("{ty} {} {attr}", self.resolve(a.name))
    }

    fn input_attribute(&mut self, semantic: Option<Symbol>) -> String {
        let Some(semantic) = semantic else {
            return "[[stage_in]]".to_string();
        };
        let upper = self.resolve(semantic).to_ascii_uppercase();
        match (self.stage, upper.as_str()) {
            (ShaderStage::Vertex, "SV_VERTEXID") => "[[vertex_id]]".to_string(),
            (ShaderStage::Vertex, "SV_INSTANCEID") => "[[instance_id]]".to_string(),
            (ShaderStage::Fragment, "SV_POSITION") => "[[position]]".to_string(),
            (ShaderStage::Compute, "SV_DISPATCHTHREADID") => "[[thread_position_in_grid]]".to_string(),
            (ShaderStage::Compute, "SV_GROUPID") => "[[threadgroup_position_in_grid]]".to_string(),
            (ShaderStage::Compute, "SV_GROUPTHREADID") => "[[thread_position_in_threadgroup]]".to_string(),
            _ => "[[stage_in]]".to_string(),
        }
    }

    fn return_attribute(&mut self, semantic: Option<Symbol>, sv_semantic: Option<Symbol>, ty: &Type) -> String {
        if let BaseKind::UserDefined(_) = &ty.base {
            self.fail("struct return type emitted without per-field MSL attributes (stage_out annotation not modeled)");
            return String::new();
        }
        let upper = semantic.or(sv_semantic).map(|s| self.resolve(s).to_ascii_uppercase());
        match upper.as_deref() {
            Some("SV_POSITION") => " [[position]]".to_string(),
            Some(s) if s.starts_with("SV_TARGET") => {
                let index = s.trim_start_matches("SV_TARGET").parse::<u32>().unwrap_or(0);
                format!(" [[color({index})]]")
            }
            Some("SV_DEPTH") => " [[depth(any)]]".to_string(),
            _ => String::new(),
        }
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
            StatementKind::Return(value) => match value {
                Some(v) => {
                    let s = self.expr_to_string(*v);
                    self.out.write_line(&format!("return {s};"));
                }
                None => self.out.write_line("return;"),
            },
            StatementKind::Discard => self.out.write_line("discard_fragment();"),
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

    fn type_name(&self, ty: &Type) -> String {
        let base = super::base_kind_name(&ty.base, |s| self.resolve(s).to_string());
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
                let op = match op {
                    BinaryOp::Mul => return self.matrix_aware_mul(*lhs, *rhs),
                    other => binary_op_str(*other),
                };
                format!("({} {} {})", self.expr_to_string(*lhs), op, self.expr_to_string(*rhs))
            }
            ExprKind::Conditional { condition, if_true, if_false } => format!(
                "({} ? {} : {})",
                self.expr_to_string(*condition),
                self.expr_to_string(*if_true),
                self.expr_to_string(*if_false)
            ),
            ExprKind::Cast { ty, operand } => format!("(({}){})", self.type_name(ty), self.expr_to_string(*operand)),
            ExprKind::Literal(lit) => literal_to_string(*lit),
            ExprKind::Identifier { name, array_dims, .. } => {
                format!("{}{}", self.resolve(*name), array_dims_value_suffix(self, array_dims))
            }
            ExprKind::Constructor { ty, args } => {
                format!("{}({})", self.type_name(ty), self.arg_chain_string(*args))
            }
            ExprKind::MemberAccess { object, field, function_call, is_function_call, .. } => {
                self.member_access_to_string(*object, *field, *function_call, *is_function_call)
            }
            ExprKind::ArrayAccess { array, index } => {
                format!("{}[{}]", self.expr_to_string(*array), self.expr_to_string(*index))
            }
            ExprKind::FunctionCall { callee_name, args, .. } => self.function_call_to_string(*callee_name, *args),
            ExprKind::SamplerState(_) => String::new(),
            ExprKind::TextureState { name, array_dims, index } => {
                let base = format!("{}{}", self.resolve(*name), array_dims_value_suffix(self, array_dims));
                match index {
                    Some(i) => format!("{base}[{}]", self.expr_to_string(*i)),
                    None => base,
                }
            }
            ExprKind::Preprocessor { contents, .. } => contents.map(|s| self.resolve(s).to_string()).unwrap_or_default(),
        }
    }

    /// `mul(a, b)` compiles to HLSL matrix-multiply semantics; MSL spells
    /// the equivalent with `*` same as GLSL once operand order is
    /// preserved (both use column-major `*` composition for `float4x4`).
    fn matrix_aware_mul(&self, lhs: Id<Expr>, rhs: Id<Expr>) -> String {
        format!("({} * {})", self.expr_to_string(lhs), self.expr_to_string(rhs))
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
            let args = self.arg_chain_string(function_call);
            return format!("{obj}.sample({args})");
        }
        if is_function_call && field_text == "Load" {
            let args = self.arg_chain_string(function_call);
            return format!("{obj}.read({args})");
        }
        if is_function_call {
            let args = self.arg_chain_string(function_call);
            return format!("{obj}.{field_text}({args})");
        }
        format!("{obj}.{field_text}")
    }

    fn arg_chain_string(&self, head: Option<Id<Expr>>) -> String {
        let mut parts = Vec::new();
        let mut cursor = head;
        while let Some(id) = cursor {
            parts.push(self.expr_to_string(id));
            cursor = self.module.exprs[id].next;
        }
        parts.join(", ")
    }

    fn function_call_to_string(&self, callee_name: Symbol, args: Option<Id<Expr>>) -> String {
        let name = self.resolve(callee_name);
        let arg_strs: Vec<_> = {
            let mut v = Vec::new();
            let mut cursor = args;
            while let Some(id) = cursor {
                v.push(self.expr_to_string(id));
                cursor = self.module.exprs[id].next;
            }
            v
        };
        match name {
            "mul" if arg_strs.len() == 2 => format!("({} * {})", arg_strs[0], arg_strs[1]),
            "lerp" => format!("mix({})", arg_strs.join(", ")),
            "frac" => format!("fract({})", arg_strs.join(", ")),
            "saturate" => format!("saturate({})", arg_strs.join(", ")),
            "rsqrt" => format!("rsqrt({})", arg_strs.join(", ")),
            "ddx" => format!("dfdx({})", arg_strs.join(", ")),
            "ddy" => format!("dfdy({})", arg_strs.join(", ")),
            "InterlockedAdd" if arg_strs.len() >= 2 => {
                format!("atomic_fetch_add_explicit({}, {}, memory_order_relaxed)", arg_strs[0], arg_strs[1])
            }
            "WaveActiveSum" => format!("simd_sum({})", arg_strs.join(", ")),
            "WaveActiveMax" => format!("simd_max({})", arg_strs.join(", ")),
            "WaveGetLaneIndex" => "simd_lane_id".to_string(),
            _ => format!("{name}({})", arg_strs.join(", ")),
        }
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

fn texture_dims_keyword(shape: crate::types::TextureShape) -> &'static str {
    use crate::types::TextureShape::*;
    match shape {
        Tex1D => "texture1d",
        Tex1DArray => "texture1d_array",
        Tex2D => "texture2d",
        Tex2DArray => "texture2d_array",
        Tex3D => "texture3d",
        Tex2DMS => "texture2d_ms",
        Tex2DMSArray => "texture2d_ms_array",
        Cube => "texturecube",
        CubeArray => "texturecube_array",
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
    fn vertex_entry_gets_position_attribute_and_stage_qualifier() {
        let (module, mut pool) = compile("float4 main(float4 pos : POSITION) : SV_Position { return pos; }");
        let entry = pool.intern("main");
        let options = GenOptions::default();
        let (text, errors) = generate(&module, &pool, &options, entry, ShaderStage::Vertex);
        assert!(errors.is_empty());
        assert!(text.contains("vertex float4 main"));
        assert!(text.contains("[[position]]"));
        assert!(text.contains("return pos;"));
    }

    #[test]
    fn cbuffer_is_lifted_into_a_class_argument() {
        let (module, mut pool) = compile(
            "cbuffer Globals : register(b0) { float4x4 mvp; };\n\
             float4 main(float4 pos : POSITION) : SV_Position { return mul(mvp, pos); }",
        );
        let entry = pool.intern("main");
        let options = GenOptions::default();
        let (text, errors) = generate(&module, &pool, &options, entry, ShaderStage::Vertex);
        assert!(errors.is_empty());
        assert!(text.contains("constant Globals& Globals [[buffer(0)]]"));
        assert!(text.contains("(mvp * pos)"));
    }

    #[test]
    fn texture_sample_call_is_rewritten_to_lowercase_method() {
        let (module, mut pool) = compile(
            "Texture2D<float4> tex : register(t0);\n\
             SamplerState samp : register(s0);\n\
             float4 main(float2 uv : TEXCOORD) : SV_Target { return tex.Sample(samp, uv); }",
        );
        let entry = pool.intern("main");
        let options = GenOptions::default();
        let (text, errors) = generate(&module, &pool, &options, entry, ShaderStage::Fragment);
        assert!(errors.is_empty());
        assert!(text.contains("texture2d<float, access::read> tex [[texture(0)]]"));
        assert!(text.contains("sampler samp [[sampler(0)]]"));
        assert!(text.contains("tex.sample(samp, uv)"));
    }
}
