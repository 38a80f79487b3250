//! Shader Template Tests
//!
//! Tests for:
//! - Every generated WGSL module parses and validates with naga
//! - Entry points and bind group layout of the generated modules
//! - Template constants for non-default kernels
//! - Template lookup and chunk includes

use anyhow::{Result, anyhow};
use myth_postfx::kernel::BlurKernel;
use myth_postfx::renderer::ShaderProgram;
use myth_postfx::renderer::shader_library::{render_template, scene_source, source_hash};

fn validate(label: &str, source: &str) -> Result<naga::Module> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| anyhow!("{label}: {}", e.emit_to_string(source)))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| anyhow!("{label} failed validation: {}", e.emit_to_string(source)))?;
    Ok(module)
}

fn all_programs() -> Vec<ShaderProgram> {
    vec![
        ShaderProgram::box_blur(BlurKernel::default()).unwrap(),
        ShaderProgram::mask_composite().unwrap(),
        ShaderProgram::focus_composite().unwrap(),
        ShaderProgram::present().unwrap(),
    ]
}

fn entry_points(module: &naga::Module) -> Vec<(&str, naga::ShaderStage)> {
    module
        .entry_points
        .iter()
        .map(|ep| (ep.name.as_str(), ep.stage))
        .collect()
}

/// Number of `var` bindings in group 0.
fn binding_count(module: &naga::Module) -> usize {
    module
        .global_variables
        .iter()
        .filter(|(_, var)| var.binding.as_ref().is_some_and(|b| b.group == 0))
        .count()
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn fullscreen_programs_validate() -> Result<()> {
    for program in all_programs() {
        validate(program.label(), program.source())?;
    }
    Ok(())
}

#[test]
fn scene_shader_validates() -> Result<()> {
    let source = scene_source()?;
    let module = validate("scene", &source)?;
    // uniforms + material texture + repeat sampler
    assert_eq!(binding_count(&module), 3);
    let vs = module
        .entry_points
        .iter()
        .find(|ep| ep.name == "vs_main")
        .ok_or_else(|| anyhow!("scene shader has no vs_main"))?;
    assert_eq!(vs.function.arguments.len(), 2, "position and uv inputs");
    Ok(())
}

#[test]
fn small_and_large_kernels_validate() -> Result<()> {
    for (radius, spacing) in [(1, 1.0), (3, 1.5), (21, 2.0)] {
        let program = ShaderProgram::box_blur(BlurKernel::new(radius, spacing))?;
        validate(&format!("blur r={radius}"), program.source())?;
    }
    Ok(())
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn programs_expose_vertex_and_fragment_entry_points() -> Result<()> {
    for program in all_programs() {
        let module = validate(program.label(), program.source())?;
        let entries = entry_points(&module);
        assert!(entries.contains(&("vs_main", naga::ShaderStage::Vertex)));
        assert!(entries.contains(&("fs_main", naga::ShaderStage::Fragment)));
    }
    Ok(())
}

#[test]
fn bindings_match_declared_textures() -> Result<()> {
    for program in all_programs() {
        let module = validate(program.label(), program.source())?;
        // uniforms + sampler + one per texture
        assert_eq!(
            binding_count(&module),
            2 + program.textures().len(),
            "{}",
            program.label()
        );
    }
    Ok(())
}

// ============================================================================
// Templates
// ============================================================================

#[test]
fn missing_template_is_an_error() {
    assert!(render_template("passes/does_not_exist", minijinja::context! {}).is_err());
}

#[test]
fn includes_resolve_to_chunks() -> Result<()> {
    let ctx = minijinja::context! { textures => ["source"], flag_blur_enabled => 1 };
    let source = render_template("passes/present", ctx)?;
    assert!(!source.contains("include"));
    assert!(source.contains("struct PassUniforms"));
    assert!(source.contains("fn vs_main"));
    Ok(())
}

#[test]
fn template_name_may_carry_extension() -> Result<()> {
    assert_eq!(
        render_template("scene/flat_lit.wgsl", minijinja::context! {})?,
        scene_source()?
    );
    Ok(())
}

#[test]
fn source_hash_is_stable() {
    let program = ShaderProgram::present().unwrap();
    assert_eq!(program.source_hash(), source_hash(program.source()));
    assert_ne!(source_hash("a"), source_hash("b"));
}
