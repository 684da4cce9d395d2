//! HLSL generator — near-identity re-emission after the AST transforms.
//!
//! Re-emits buffers with explicit `register(n, spaceM)` bindings, attributes
//! in bracket form, and preprocessor nodes verbatim so `#define`/`#include`
//! survive a parse → transform → emit → parse round trip.

use super::{cw_write, CodeWriter, GenOptions};
use crate::ast::*;
use crate::error::CodegenError;
use crate::string_pool::{StringPool, Symbol};
use crate::types::{ArrayDim, BaseKind, BufferKind, TextureAccess, TextureShape, Type};

pub fn generate(module: &Module, pool: &StringPool, options: &GenOptions) -> (String, Vec<CodegenError>) {
    let mut gen = Generator { module, pool, out: CodeWriter::new(), errors: Vec::new(), options };
    gen.run();
    (gen.out.finish(), gen.errors)
}

struct Generator<'a> {
    module: &'a Module,
    pool: &'a StringPool,
    out: CodeWriter,
    errors: Vec<CodegenError>,
    options: &'a GenOptions,
}

impl<'a> Generator<'a> {
    fn resolve(&self, sym: Symbol) -> &'a str {
        self.pool.resolve(sym)
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.errors.push(CodegenError { message: message.into() });
    }

    fn run(&mut self) {
        for id in self.module.statements() {
            if self.module.statements[id].hidden {
                continue;
            }
            self.emit_top_level(id);
        }
    }

    fn emit_preceding_preproc(&mut self, header: &NodeHeader) {
        if let Some(p) = header.preproc {
            self.emit_top_level(p);
        }
    }

    fn emit_top_level(&mut self, id: Id<Statement>) {
        let stmt = self.module.statements[id].clone();
        self.emit_preceding_preproc(&stmt.header);
        self.emit_attributes(&stmt.attributes);
        match &stmt.kind {
            StatementKind::Struct(s) => self.emit_struct(s, stmt.name),
            StatementKind::Buffer(b) => self.emit_buffer(stmt.register, b, stmt.name),
            StatementKind::Function(f) => self.emit_function(*f),
            StatementKind::Declaration(d) => self.emit_global_declaration(d, stmt.name, stmt.register),
            StatementKind::SamplerState(s) => self.emit_sampler_state(s, stmt.name, stmt.register),
            StatementKind::TextureState(t) => self.emit_texture_state(t, stmt.name, stmt.register),
            StatementKind::GroupShared(d) => {
                let ty = self.type_name(&d.ty);
                cw_write!(self.out, "groupshared {} {};", ty, self.resolve(stmt.name));
                self.out.end_line();
            }
            StatementKind::Preprocessor(p) => self.emit_preprocessor(p),
            StatementKind::Technique(t) => self.emit_technique(t, stmt.name),
            StatementKind::Pipeline(p) => self.emit_pipeline(p, stmt.name),
            StatementKind::Stage(_) => {}
            _ => self.fail(format!("unsupported top-level statement kind in HLSL generator: {:?}", stmt.kind)),
        }
    }

    fn emit_attributes(&mut self, attrs: &[Attribute]) {
        for attr in attrs {
            let name = attribute_kind_name(attr.kind);
            if attr.args.is_empty() {
                self.out.write_line(&format!("[{name}]"));
            } else {
                let args: Vec<_> = attr.args.iter().map(|a| self.expr_to_string(*a)).collect();
                self.out.write_line(&format!("[{name}({})]", args.join(", ")));
            }
        }
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
            let semantic = field
                .semantic
                .map(|s| format!(" : {}", self.resolve(s)))
                .unwrap_or_default();
            cw_write!(self.out, "{} {}{};", ty, self.resolve(field.name), semantic);
            self.out.end_line();
        }
        self.out.dedent();
        self.out.write_line("};");
    }

    fn emit_buffer(&mut self, register: Option<RegisterBinding>, b: &BufferDecl, name: Symbol) {
        let keyword = buffer_keyword(b.kind);
        let register_str = self.register_suffix(register);
        match b.kind {
            BufferKind::CBuffer | BufferKind::TBuffer => {
                cw_write!(self.out, "{} {}{} {{", keyword, self.resolve(name), register_str);
                self.out.end_line();
                self.out.indent();
                for (field_name, field) in &b.fields {
                    self.emit_declaration_line(field, *field_name);
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
                    .unwrap_or_else(|| "float4".to_string());
                cw_write!(
                    self.out,
                    "{}<{}> {}{};",
                    keyword,
                    elem,
                    self.resolve(name),
                    register_str
                );
                self.out.end_line();
            }
        }
    }

    fn register_suffix(&self, register: Option<RegisterBinding>) -> String {
        match register {
            Some(r) => {
                let space = r.space.map(|s| format!(", {}", self.resolve(s))).unwrap_or_default();
                format!(" : register({}{})", self.resolve(r.register), space)
            }
            None => String::new(),
        }
    }

    fn emit_sampler_state(&mut self, s: &SamplerStateDecl, name: Symbol, register: Option<RegisterBinding>) {
        let keyword = if s.is_comparison { "SamplerComparisonState" } else { "SamplerState" };
        let register_str = self.register_suffix(register);
        if s.state_assignments.is_empty() {
            cw_write!(self.out, "{} {}{};", keyword, self.resolve(name), register_str);
            self.out.end_line();
            return;
        }
        cw_write!(self.out, "{} {}{} {{", keyword, self.resolve(name), register_str);
        self.out.end_line();
        self.out.indent();
        for assignment in &s.state_assignments {
            let field = sampler_state_field_name(assignment.field);
            let value = self.expr_to_string(assignment.value);
            cw_write!(self.out, "{} = {};", field, value);
            self.out.end_line();
        }
        self.out.dedent();
        self.out.write_line("};");
    }

    fn emit_texture_state(&mut self, t: &TextureStateDecl, name: Symbol, register: Option<RegisterBinding>) {
        let keyword = texture_shape_keyword(t.texture_type.shape, t.texture_type.access);
        let elem = self.type_name(&t.element_type);
        let register_str = self.register_suffix(register);
        cw_write!(self.out, "{}<{}> {}{};", keyword, elem, self.resolve(name), register_str);
        self.out.end_line();
    }

    fn emit_global_declaration(&mut self, d: &Declaration, name: Symbol, register: Option<RegisterBinding>) {
        let ty = self.type_name(&d.ty);
        let semantic = d.semantic.map(|s| format!(" : {}", self.resolve(s))).unwrap_or_default();
        let register_str = self.register_suffix(register);
        let assign = d
            .assignment
            .map(|a| format!(" = {}", self.expr_to_string(a)))
            .unwrap_or_default();
        cw_write!(
            self.out,
            "{} {}{}{}{};",
            ty,
            self.resolve(name),
            semantic,
            register_str,
            assign
        );
        self.out.end_line();
        let mut next = d.next_declaration.as_deref();
        while let Some(more) = next {
            let assign = more
                .assignment
                .map(|a| format!(" = {}", self.expr_to_string(a)))
                .unwrap_or_default();
            cw_write!(self.out, "{} {}{};", ty, self.resolve(more.name), assign);
            self.out.end_line();
            next = more.next_declaration.as_deref();
        }
    }

    fn emit_function(&mut self, func_id: Id<Function>) {
        let func = self.module.functions[func_id].clone();
        if func.hidden {
            return;
        }
        self.emit_attributes(&func.attributes);
        let ret = self.type_name(&func.return_type);
        let args: Vec<_> = func
            .arguments
            .iter()
            .filter(|a| !a.hidden)
            .map(|a| self.argument_string(a))
            .collect();
        let semantic = func.semantic.map(|s| format!(" : {}", self.resolve(s))).unwrap_or_default();
        cw_write!(
            self.out,
            "{} {}({}){}",
            ret,
            self.resolve(func.name),
            args.join(", "),
            semantic
        );
        match func.body {
            Some(body) => {
                self.out.end_line();
                self.emit_statement(body);
            }
            None => self.out.write_line(";"),
        }
    }

    fn argument_string(&self, a: &Argument) -> String {
        let modifier = argument_modifier_keyword(a.modifier);
        let ty = self.type_name(&a.ty);
        let semantic = a.semantic.map(|s| format!(" : {}", self.resolve(s))).unwrap_or_default();
        let default = a
            .default_value
            .map(|e| format!(" = {}", self.expr_to_string(e)))
            .unwrap_or_default();
        format!("{modifier}{ty} {}{semantic}{default}", self.resolve(a.name))
    }

    fn emit_technique(&mut self, t: &Technique, name: Symbol) {
        cw_write!(self.out, "technique10 {} {{", self.resolve(name));
        self.out.end_line();
        self.out.indent();
        for pass in &t.passes {
            cw_write!(self.out, "pass {} {{", self.resolve(pass.name));
            self.out.end_line();
            self.out.indent();
            for (field, value) in &pass.state_assignments {
                let value = self.expr_to_string(*value);
                cw_write!(self.out, "{} = {};", self.resolve(*field), value);
                self.out.end_line();
            }
            self.out.dedent();
            self.out.write_line("}");
        }
        self.out.dedent();
        self.out.write_line("}");
    }

    fn emit_pipeline(&mut self, p: &Pipeline, name: Symbol) {
        cw_write!(self.out, "pipeline {} {{", self.resolve(name));
        self.out.end_line();
        self.out.indent();
        for stage in &p.stages {
            let func_name = stage
                .function
                .map(|f| self.resolve(self.module.functions[f].name).to_string())
                .unwrap_or_default();
            cw_write!(self.out, "{} = {};", self.resolve(stage.name), func_name);
            self.out.end_line();
        }
        self.out.dedent();
        self.out.write_line("}");
    }

    fn emit_preprocessor(&mut self, p: &PreprocDirective) {
        let contents = p.contents.map(|s| self.resolve(s)).unwrap_or("");
        match p.kind {
            PreprocKind::Define => self.out.write_line(&format!("#define {}", contents)),
            PreprocKind::Include => self.out.write_line(&format!("#include {}", contents)),
            PreprocKind::If => self.out.write_line(&format!("#if {}", contents)),
            PreprocKind::Elif => self.out.write_line(&format!("#elif {}", contents)),
            PreprocKind::Ifdef => self.out.write_line(&format!("#ifdef {}", contents)),
            PreprocKind::Ifndef => self.out.write_line(&format!("#ifndef {}", contents)),
            PreprocKind::Else => self.out.write_line("#else"),
            PreprocKind::Endif => self.out.write_line("#endif"),
            PreprocKind::Undef => self.out.write_line(&format!("#undef {}", contents)),
            PreprocKind::Line => self.out.write_line(&format!("#line {}", contents)),
            PreprocKind::Pragma => self.out.write_line(&format!("#pragma {}", contents)),
            PreprocKind::UserMacroComment => self.out.write_line(&format!("// USERMACRO {}", contents)),
        }
    }

    fn emit_statement(&mut self, id: Id<Statement>) {
        let stmt = self.module.statements[id].clone();
        self.emit_preceding_preproc(&stmt.header);
        match &stmt.kind {
            StatementKind::Block(first) => self.emit_block(*first),
            StatementKind::Declaration(d) => self.emit_declaration_line(d, stmt.name),
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
            StatementKind::Discard => self.out.write_line("discard;"),
            StatementKind::Break => self.out.write_line("break;"),
            StatementKind::Continue => self.out.write_line("continue;"),
            StatementKind::If(s) => self.emit_if(s),
            StatementKind::For(s) => self.emit_for(s),
            StatementKind::While(s) => self.emit_while(s),
            StatementKind::Switch(s) => self.emit_switch(s),
            _ => self.emit_top_level(id),
        }
    }

    fn emit_block(&mut self, first: Option<Id<Statement>>) {
        self.out.write_line("{");
        self.out.indent();
        let mut cursor = first;
        while let Some(id) = cursor {
            self.emit_statement(id);
            cursor = self.module.statements[id].next;
        }
        self.out.dedent();
        self.out.write_line("}");
    }

    fn emit_one_or_block(&mut self, id: Option<Id<Statement>>) {
        match id {
            Some(id) => self.emit_statement(id),
            None => self.out.write_line(";"),
        }
    }

    fn emit_if(&mut self, s: &IfStatement) {
        let cond = self.expr_to_string(s.condition);
        cw_write!(self.out, "if ({cond})");
        self.out.end_line();
        self.emit_one_or_block(s.then_branch);
        for (cond, branch) in &s.else_ifs {
            let cond = self.expr_to_string(*cond);
            cw_write!(self.out, "else if ({cond})");
            self.out.end_line();
            self.emit_one_or_block(*branch);
        }
        if let Some(else_branch) = s.else_branch {
            self.out.write_line("else");
            self.emit_one_or_block(Some(else_branch));
        }
    }

    fn emit_for(&mut self, s: &ForStatement) {
        let init = if let Some((name, d)) = &s.init_declaration {
            let ty = self.type_name(&d.ty);
            let assign = d
                .assignment
                .map(|a| format!(" = {}", self.expr_to_string(a)))
                .unwrap_or_default();
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
        self.emit_one_or_block(s.body);
    }

    fn emit_while(&mut self, s: &WhileStatement) {
        let cond = self.expr_to_string(s.condition);
        cw_write!(self.out, "while ({cond})");
        self.out.end_line();
        self.emit_one_or_block(s.body);
    }

    fn emit_switch(&mut self, s: &SwitchStatement) {
        let cond = s.condition.map(|c| self.expr_to_string(c)).unwrap_or_default();
        cw_write!(self.out, "switch ({cond}) {{");
        self.out.end_line();
        self.out.indent();
        for (value, body) in &s.cases {
            let value = self.expr_to_string(*value);
            cw_write!(self.out, "case {value}:");
            self.out.end_line();
            self.out.indent();
            self.emit_one_or_block(*body);
            self.out.dedent();
        }
        if let Some(default) = s.default {
            self.out.write_line("default:");
            self.out.indent();
            self.emit_one_or_block(Some(default));
            self.out.dedent();
        }
        self.out.dedent();
        self.out.write_line("}");
    }

    fn emit_declaration_line(&mut self, d: &Declaration, name: Symbol) {
        self.emit_global_declaration(d, name, None);
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
                format!("({} {} {})", self.expr_to_string(*lhs), binary_op_str(*op), self.expr_to_string(*rhs))
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
                let obj = self.expr_to_string(*object);
                if *is_function_call {
                    let args = function_call.map(|a| self.arg_chain_string(Some(a))).unwrap_or_default();
                    format!("{obj}.{}({args})", self.resolve(*field))
                } else {
                    format!("{obj}.{}", self.resolve(*field))
                }
            }
            ExprKind::ArrayAccess { array, index } => {
                format!("{}[{}]", self.expr_to_string(*array), self.expr_to_string(*index))
            }
            ExprKind::FunctionCall { callee_name, args, .. } => {
                format!("{}({})", self.resolve(*callee_name), self.arg_chain_string(*args))
            }
            ExprKind::SamplerState(assignments) => {
                let inner: Vec<_> = assignments
                    .iter()
                    .map(|a| format!("{} = {}", sampler_state_field_name(a.field), self.expr_to_string(a.value)))
                    .collect();
                format!("SamplerState {{ {} }}", inner.join(", "))
            }
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

    fn arg_chain_string(&self, head: Option<Id<Expr>>) -> String {
        let mut parts = Vec::new();
        let mut cursor = head;
        while let Some(id) = cursor {
            parts.push(self.expr_to_string(id));
            cursor = self.module.exprs[id].next;
        }
        parts.join(", ")
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

fn argument_modifier_keyword(modifier: ArgumentModifier) -> &'static str {
    match modifier {
        ArgumentModifier::None => "",
        ArgumentModifier::In => "in ",
        ArgumentModifier::Out => "out ",
        ArgumentModifier::InOut => "inout ",
        ArgumentModifier::Uniform => "uniform ",
        ArgumentModifier::Const => "const ",
        ArgumentModifier::Point => "point ",
        ArgumentModifier::Line => "line ",
        ArgumentModifier::Triangle => "triangle ",
        ArgumentModifier::LineAdj => "lineadj ",
        ArgumentModifier::TriangleAdj => "triangleadj ",
    }
}

fn attribute_kind_name(kind: AttributeKind) -> &'static str {
    match kind {
        AttributeKind::Unroll => "unroll",
        AttributeKind::Branch => "branch",
        AttributeKind::Flatten => "flatten",
        AttributeKind::NumThreads => "numthreads",
        AttributeKind::MaxVertexCount => "maxvertexcount",
        AttributeKind::Domain => "domain",
        AttributeKind::Partitioning => "partitioning",
        AttributeKind::OutputTopology => "outputtopology",
        AttributeKind::OutputControlPoints => "outputcontrolpoints",
        AttributeKind::PatchConstantFunc => "patchconstantfunc",
        AttributeKind::MaxTessFactor => "maxtessfactor",
        AttributeKind::EarlyDepthStencil => "earlydepthstencil",
    }
}

fn sampler_state_field_name(field: crate::types::SamplerStateField) -> &'static str {
    use crate::types::SamplerStateField::*;
    match field {
        Filter => "Filter",
        AddressU => "AddressU",
        AddressV => "AddressV",
        AddressW => "AddressW",
        MipLodBias => "MipLODBias",
        MaxAnisotropy => "MaxAnisotropy",
        MinLod => "MinLOD",
        MaxLod => "MaxLOD",
        BorderColor => "BorderColor",
        ComparisonFunc => "ComparisonFunc",
    }
}

fn buffer_keyword(kind: BufferKind) -> &'static str {
    match kind {
        BufferKind::CBuffer => "cbuffer",
        BufferKind::TBuffer => "tbuffer",
        BufferKind::ConstantBuffer => "ConstantBuffer",
        BufferKind::StructuredBuffer => "StructuredBuffer",
        BufferKind::Buffer => "Buffer",
        BufferKind::RWBuffer => "RWBuffer",
        BufferKind::RWStructuredBuffer => "RWStructuredBuffer",
        BufferKind::ByteAddressBuffer => "ByteAddressBuffer",
        BufferKind::RWByteAddressBuffer => "RWByteAddressBuffer",
        BufferKind::RasterizerOrderedBuffer => "RasterizerOrderedBuffer",
        BufferKind::RasterizerOrderedStructuredBuffer => "RasterizerOrderedStructuredBuffer",
        BufferKind::RasterizerOrderedByteAddressBuffer => "RasterizerOrderedByteAddressBuffer",
    }
}

fn texture_shape_keyword(shape: TextureShape, access: TextureAccess) -> String {
    let prefix = match access {
        TextureAccess::ReadOnly => "Texture",
        TextureAccess::ReadWrite => "RWTexture",
        TextureAccess::RasterizerOrdered => "RasterizerOrderedTexture",
    };
    let suffix = match shape {
        TextureShape::Tex1D => "1D",
        TextureShape::Tex1DArray => "1DArray",
        TextureShape::Tex2D => "2D",
        TextureShape::Tex2DArray => "2DArray",
        TextureShape::Tex3D => "3D",
        TextureShape::Tex2DMS => "2DMS",
        TextureShape::Tex2DMSArray => "2DMSArray",
        TextureShape::Cube => "Cube",
        TextureShape::CubeArray => "CubeArray",
    };
    format!("{prefix}{suffix}")
}

fn array_dims_suffix(dims: &[ArrayDim]) -> String {
    let mut s = String::new();
    for dim in dims {
        match dim {
            ArrayDim::Literal(n) => s.push_str(&format!("[{n}]")),
            ArrayDim::Ident(_) => s.push_str("[]"),
            ArrayDim::Unsized => s.push_str("[]"),
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
    fn reemits_a_minimal_pass_through_entry_point() {
        let (module, pool) = compile("float4 main(float4 pos : POSITION) : SV_Position { return pos; }");
        let options = GenOptions::default();
        let (text, errors) = generate(&module, &pool, &options);
        assert!(errors.is_empty());
        assert!(text.contains("float4 main"));
        assert!(text.contains("return pos;"));
    }

    #[test]
    fn reemits_cbuffer_with_register_binding() {
        let (module, pool) = compile("cbuffer Globals : register(b3) { float4x4 mvp; };");
        let options = GenOptions::default();
        let (text, errors) = generate(&module, &pool, &options);
        assert!(errors.is_empty());
        assert!(text.contains("cbuffer Globals"));
        assert!(text.contains("register(b3)"));
        assert!(text.contains("float4x4 mvp;"));
    }
}
