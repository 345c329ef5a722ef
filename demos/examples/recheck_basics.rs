// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Walks a small two-module program through a handful of edits, printing what each
//! [`envtrack_checker::recheck`] call touches.
//!
//! Run with `RUST_LOG=debug` to see the layer-by-layer tracing spans this crate emits.

use envtrack_checker::descriptor::Descriptor;
use envtrack_checker::names::{ModuleName, QualifiedName};
use envtrack_checker::recheck::recheck;
use envtrack_checker::stack::EnvironmentStack;
use envtrack_checker::testing::{FakeModule, FakeParser, MarkerPostprocessingPass, NoopRuntime, RecordingInferencePass};
use envtrack_checker::ErrorTable;
use envtrack_core::scheduler::SequentialScheduler;
use envtrack_core::Registry;

fn define(module: &ModuleName, symbol: &str) -> QualifiedName {
    QualifiedName::new(module.clone(), symbol)
}

fn main() {
    tracing_subscriber::fmt::init();

    let registry = Registry::<Descriptor>::shared();
    let parser = FakeParser::new();
    let mut stack = EnvironmentStack::new(parser.clone(), registry);
    let mut errors = ErrorTable::new();
    let runtime = NoopRuntime::new();
    let inference = RecordingInferencePass::new();
    let postprocessing = MarkerPostprocessingPass::new();
    let scheduler = SequentialScheduler;

    let routes = ModuleName::new("myapp.routes");
    let models = ModuleName::new("myapp.models");

    parser.set_module(
        models.clone(),
        FakeModule::new().with_class(define(&models, "User"), Vec::new()).with_annotated_symbol(define(&models, "load_user"), "User"),
    );
    parser.set_module(
        routes.clone(),
        FakeModule::new().with_annotated_symbol(define(&routes, "handle_request"), "Response"),
    );

    let outcome = recheck(&runtime, &scheduler, &mut stack, &mut errors, &inference, &postprocessing, &[]).unwrap();
    println!("initial recheck post-processed: {:?}", outcome.modules);
    println!("type-checked so far: {:?}", inference.recorded());

    // Editing routes.py should never touch models.py.
    parser.set_module(
        routes.clone(),
        FakeModule::new().with_annotated_symbol(define(&routes, "handle_request"), "JsonResponse"),
    );
    let outcome = recheck(&runtime, &scheduler, &mut stack, &mut errors, &inference, &postprocessing, &[]).unwrap();
    println!("after editing routes.py: {:?}", outcome.modules);

    // Adding a subclass of User re-linearizes the pessimistic class-hierarchy layer.
    parser.set_module(
        models.clone(),
        FakeModule::new()
            .with_class(define(&models, "User"), Vec::new())
            .with_class(define(&models, "AdminUser"), vec![define(&models, "User")])
            .with_annotated_symbol(define(&models, "load_user"), "User"),
    );
    let outcome = recheck(&runtime, &scheduler, &mut stack, &mut errors, &inference, &postprocessing, &[]).unwrap();
    println!("after adding AdminUser: {:?}", outcome.modules);
    println!("diagnostics for models: {:?}", errors.for_module(&models));
}
