use hlsl_xc::ast::{Module, StatementKind};
use hlsl_xc::intrinsics::IntrinsicTable;
use hlsl_xc::parser::Parser;
use hlsl_xc::preprocessor::NullPreprocessor;
use hlsl_xc::string_pool::StringPool;
use hlsl_xc::token_buffer::TokenBuffer;
use hlsl_xc::tokenizer::Tokenizer;
use hlsl_xc::transforms;
use hlsl_xc::types::ArrayDim;
use hlsl_xc::{codegen, compile, Language, Options, Target};

fn parse(source: &str, pool: &mut StringPool) -> Module {
    let file = pool.intern("test.hlsl");
    let tokenizer = Tokenizer::new(source, file, 1, pool);
    let buffer = TokenBuffer::drain(tokenizer, pool, file);
    let intrinsics = IntrinsicTable::build(pool);
    Parser::parse(buffer, pool, &intrinsics).expect("source parses")
}

#[test]
fn minimal_pass_through_round_trips_through_hlsl() {
    let mut pre = NullPreprocessor;
    let options = Options { language: Some(Language::Hlsl), target: Some(Target::Vertex), ..Options::default() };
    let result = compile(
        "float4 main(float4 pos : POSITION) : SV_Position { return pos; }",
        "main",
        &[],
        &mut pre,
        &options,
    )
    .expect("compiles");
    assert!(result.generate_ok);
    assert!(result.generated_text.contains("float4 main"));
    assert!(result.generated_text.contains("return pos;"));
}

#[test]
fn glsl_vertex_stage_marshals_position_semantic() {
    let mut pre = NullPreprocessor;
    let options = Options { language: Some(Language::Glsl), target: Some(Target::Vertex), ..Options::default() };
    let result = compile(
        "float4 main(float4 pos : POSITION) : SV_Position { return pos; }",
        "main",
        &[],
        &mut pre,
        &options,
    )
    .expect("compiles");
    assert!(result.generate_ok);
    assert!(result.generated_text.contains("#version 450"));
    assert!(result.generated_text.contains("gl_Position = pos;"));
}

#[test]
fn msl_lifts_cbuffer_and_textures_into_class_arguments() {
    let source = r#"
        cbuffer Globals : register(b3) { float4x4 mvp; }
        Texture2D<float4> t : register(t0);
        SamplerState s : register(s0);
        float4 main(float2 uv : TEXCOORD0) : SV_Target0 {
            return mul(mvp, t.Sample(s, uv));
        }
    "#;
    let mut pre = NullPreprocessor;
    let options = Options { language: Some(Language::Msl), target: Some(Target::Fragment), ..Options::default() };
    let result = compile(source, "main", &[], &mut pre, &options).expect("compiles");
    assert!(result.generate_ok, "errors: {:?}", result.generate_errors);
    assert!(result.generated_text.contains("constant Globals& Globals [[buffer("));
    assert!(result.generated_text.contains("texture2d<float> t [[texture("));
    assert!(result.generated_text.contains("sampler s [[sampler("));
    assert!(result.generated_text.contains("t.sample(s, uv)"));
}

#[test]
fn alpha_test_emulation_guards_every_return() {
    let mut pool = StringPool::new();
    let mut module = parse(
        "float4 PSMain(float4 color : COLOR) : SV_Target0 { if (color.r > 0.5) { return color; } return float4(0, 0, 0, 0); }",
        &mut pool,
    );
    let entry = pool.intern("PSMain");
    transforms::emulate_alpha_test(&mut module, &mut pool, entry, 0.5);
    let (text, errors) = codegen::hlsl::generate(&module, &pool, &codegen::GenOptions::default());
    assert!(errors.is_empty(), "errors: {errors:?}");
    let discard_count = text.matches("discard;").count();
    let return_count = text.matches("return ").count();
    assert_eq!(discard_count, return_count);
    assert!(text.contains(".a < 0.5"));
}

#[test]
fn prune_tree_hides_every_function_unreachable_from_the_entry() {
    let mut pool = StringPool::new();
    let mut source = String::new();
    for i in 0..9 {
        source.push_str(&format!("float helper{i}() {{ return 0.0; }}\n"));
    }
    source.push_str("float4 main() : SV_Target0 { helper0(); return float4(0, 0, 0, 0); }\n");
    let mut module = parse(&source, &mut pool);

    let entry = pool.intern("main");
    transforms::prune_tree(&mut module, entry, None);

    let mut visible_functions = 0;
    let mut hidden_functions = 0;
    for id in module.statements.iter_ids() {
        if let StatementKind::Function(_) = &module.statements[id].kind {
            if module.statements[id].hidden {
                hidden_functions += 1;
            } else {
                visible_functions += 1;
            }
        }
    }
    assert_eq!(visible_functions, 2, "main and the one function it calls should survive");
    assert_eq!(hidden_functions, 8);
}

#[test]
fn constant_folds_binary_expression_into_array_dimension() {
    let mut pool = StringPool::new();
    let module = parse("static const int N = 2 + 3 * 4;\nfloat a[N];\n", &mut pool);

    let mut found = false;
    for id in module.statements.iter_ids() {
        let stmt = &module.statements[id];
        if stmt.name == pool.intern("a") {
            if let StatementKind::Declaration(d) = &stmt.kind {
                found = true;
                match d.ty.array_dims.first() {
                    Some(ArrayDim::Literal(n)) => assert_eq!(*n, 14),
                    Some(ArrayDim::Ident(sym)) => assert_eq!(*sym, pool.intern("N")),
                    other => panic!("unexpected array dimension: {other:?}"),
                }
            }
        }
    }
    assert!(found, "declaration of `a` not found");
}

#[test]
fn else_if_is_a_single_token_else_newline_if_is_two() {
    let mut pool = StringPool::new();
    // Both forms must parse to an equivalent if/else-if chain; this is a
    // parser-level property, so just assert both inputs parse successfully.
    let _ = parse("float f() { if (true) { return 1.0; } else if (false) { return 2.0; } return 0.0; }", &mut pool);
    let _ = parse("float f() { if (true) { return 1.0; } else\nif (false) { return 2.0; } return 0.0; }", &mut pool);
}

#[test]
fn empty_struct_and_cbuffer_bodies_parse() {
    let mut pool = StringPool::new();
    let module = parse("struct Empty {};\ncbuffer EmptyBuf { };\n", &mut pool);
    let mut saw_struct = false;
    let mut saw_buffer = false;
    for id in module.statements.iter_ids() {
        match &module.statements[id].kind {
            StatementKind::Struct(_) => saw_struct = true,
            StatementKind::Buffer(_) => saw_buffer = true,
            _ => {}
        }
    }
    assert!(saw_struct);
    assert!(saw_buffer);
}
