//! Shader Template Library
//!
//! WGSL sources are minijinja templates embedded into the binary. Templates
//! use a custom delimiter set so they do not collide with WGSL syntax:
//!
//! | Syntax       | Meaning                                   |
//! |--------------|-------------------------------------------|
//! | `{$ ... $}`  | block (`include`, `for`, `if`)            |
//! | `{{ ... }}`  | expression                                |
//! | `$$ ...`     | line statement                            |
//!
//! `{$ include "name" $}` resolves to `chunks/name.wgsl`.
//!
//! Compiled `wgpu::ShaderModule`s are deduplicated by the xxh3-128 hash of
//! the final rendered source in [`ShaderModuleCache`].

use std::sync::OnceLock;

use minijinja::{Environment, UndefinedBehavior, syntax::SyntaxConfig};
use rust_embed::RustEmbed;
use rustc_hash::FxHashMap;
use serde::Serialize;
use xxhash_rust::xxh3::xxh3_128;

use crate::errors::Result;

/// WGSL templates. Debug builds read them from disk on every load.
#[derive(RustEmbed)]
#[folder = "src/renderer/shaders"]
struct Templates;

static ENVIRONMENT: OnceLock<Environment<'static>> = OnceLock::new();

fn environment() -> Result<&'static Environment<'static>> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env);
    }
    let env = build_environment()?;
    Ok(ENVIRONMENT.get_or_init(|| env))
}

fn build_environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.set_syntax(
        SyntaxConfig::builder()
            .block_delimiters("{$", "$}")
            .variable_delimiters("{{", "}}")
            .line_statement_prefix("$$")
            .build()?,
    );
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_undefined_behavior(UndefinedBehavior::SemiStrict);
    env.set_loader(|name| Ok(template_source(name)));
    env.set_path_join_callback(|chunk, _| format!("chunks/{chunk}").into());
    Ok(env)
}

/// Source of `name`, relative to the shader folder, with or without the
/// `.wgsl` suffix.
fn template_source(name: &str) -> Option<String> {
    let file = match name.strip_suffix(".wgsl") {
        Some(_) => Templates::get(name),
        None => Templates::get(&format!("{name}.wgsl")),
    }?;
    String::from_utf8(file.data.into_owned()).ok()
}

/// Renders `template` (e.g. `"passes/box_blur"`) with `ctx`.
pub fn render_template<S: Serialize>(template: &str, ctx: S) -> Result<String> {
    let source = environment()?.get_template(template)?.render(ctx)?;
    Ok(source)
}

/// WGSL of the scene pipeline (`vs_main` / `fs_main`, object uniforms and a
/// material texture).
pub fn scene_source() -> Result<String> {
    render_template("scene/flat_lit", minijinja::context! {})
}

/// Stable identity of a WGSL source.
#[inline]
#[must_use]
pub fn source_hash(source: &str) -> u128 {
    xxh3_128(source.as_bytes())
}

/// `wgpu::ShaderModule`s keyed by the hash of their source.
#[derive(Default)]
pub struct ShaderModuleCache {
    modules: FxHashMap<u128, wgpu::ShaderModule>,
}

impl ShaderModuleCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the module for `source`, compiling it on first use.
    pub fn get_or_compile(
        &mut self,
        device: &wgpu::Device,
        label: &str,
        source: &str,
    ) -> (&wgpu::ShaderModule, u128) {
        let hash = source_hash(source);
        let module = self.modules.entry(hash).or_insert_with(|| {
            log::debug!("Compiling shader module '{label}' ({hash:032x})");
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.to_owned().into()),
            })
        });
        (module, hash)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
