//! Performance benchmarks for Snap.
//!
//! This module contains benchmarks for:
//! - Option flag-spec parsing
//! - Command conflict detection against a large command surface
//! - Plugin token parsing
//! - Hook file parsing
//!
//! Run with: `cargo bench`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use snapvc::hooks::parse_hook;
use snapvc::plugin::{
    parse_invocation, ActionRef, CommandBinder, CommandDescriptor, CommandSurface, FlagSpec,
    Invocation, OptionDescriptor, PluginDescriptor, PluginRegistry,
};

// ============================================================================
// Fixtures
// ============================================================================

mod fixtures {
    use super::*;

    pub fn noop() -> ActionRef {
        Arc::new(|_: &Invocation| -> anyhow::Result<()> { Ok(()) })
    }

    /// A plugin with `num_commands` commands, each with an alias.
    pub fn generate_plugin(index: usize, num_commands: usize) -> PluginDescriptor {
        let mut plugin = PluginDescriptor::new(format!("plugin-{index}"), "1.0.0");
        for i in 0..num_commands {
            plugin = plugin.with_command(
                CommandDescriptor::new(format!("cmd-{index}-{i}"), "generated", noop())
                    .with_alias(format!("c{index}x{i}")),
            );
        }
        plugin
    }

    /// A command surface with `num_plugins` bound plugins of ten commands each.
    pub fn generate_surface(num_plugins: usize) -> CommandSurface {
        let mut surface = CommandSurface::new(clap::Command::new("snap"));
        let mut registry = PluginRegistry::new();
        let runtime = tokio::runtime::Runtime::new().unwrap();

        runtime.block_on(async {
            let mut binder = CommandBinder::new(&mut surface, &mut registry);
            for i in 0..num_plugins {
                binder.register_plugin(generate_plugin(i, 10)).await.unwrap();
            }
        });
        surface
    }

    pub fn generate_hook(num_commands: usize) -> String {
        let mut yaml = String::from(
            "name: Checks\ndescription: Generated\nfailOnError: true\nparallel: true\n",
        );
        yaml.push_str("env:\n  CI: true\n  LEVEL: 3\n");
        yaml.push_str("onlyIf:\n  branches: [main, develop]\n  files: [\"src/**/*.rs\"]\n");
        yaml.push_str("run:\n");
        for i in 0..num_commands {
            yaml.push_str(&format!("  - echo step {i}\n"));
        }
        yaml
    }
}

// ============================================================================
// Flag-Spec Benchmarks
// ============================================================================

fn bench_flag_spec_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("flag_spec");

    let specs = ["-v", "--verbose", "-n, --name <name>", "-t, --tag [tag]", "-o|--output <file>"];

    for spec in specs {
        group.bench_with_input(BenchmarkId::from_parameter(spec), spec, |b, spec| {
            b.iter(|| black_box(FlagSpec::parse(black_box(spec))));
        });
    }

    group.finish();
}

// ============================================================================
// Conflict Detection Benchmarks
// ============================================================================

fn bench_conflict_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("conflicts");

    for num_plugins in [10, 100] {
        let surface = fixtures::generate_surface(num_plugins);
        let candidates: Vec<String> = (0..10).map(|i| format!("cmd-0-{i}")).collect();

        group.throughput(Throughput::Elements(candidates.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("check", num_plugins * 10),
            &candidates,
            |b, candidates| {
                b.iter(|| black_box(surface.conflicts(candidates.iter().map(String::as_str))));
            },
        );
    }

    group.finish();
}

// ============================================================================
// Token Parsing Benchmarks
// ============================================================================

fn bench_token_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokens");

    let command = CommandDescriptor::new("deploy", "Deploy", fixtures::noop())
        .with_option(OptionDescriptor::new("-e, --env <env>", "Target").unwrap())
        .with_option(OptionDescriptor::new("-f, --force", "Force").unwrap())
        .with_option(OptionDescriptor::new("-t, --tag [tag]", "Tag").unwrap());

    let tokens: Vec<String> =
        ["--env", "prod", "-f", "--tag"].iter().map(|s| (*s).to_string()).collect();

    group.bench_function("parse_invocation", |b| {
        b.iter(|| black_box(parse_invocation(&command, black_box(&tokens))));
    });

    group.finish();
}

// ============================================================================
// Hook Parsing Benchmarks
// ============================================================================

fn bench_hook_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("hook_parsing");

    for num_commands in [1, 10, 100] {
        let yaml = fixtures::generate_hook(num_commands);
        group.bench_with_input(BenchmarkId::from_parameter(num_commands), &yaml, |b, yaml| {
            b.iter(|| black_box(parse_hook("pre-commit", black_box(yaml))));
        });
    }

    group.finish();
}

// ============================================================================
// Criterion Groups and Main
// ============================================================================

criterion_group!(plugin_benches, bench_flag_spec_parsing, bench_conflict_detection,);

criterion_group!(parsing_benches, bench_token_parsing, bench_hook_parsing,);

criterion_main!(plugin_benches, parsing_benches);
