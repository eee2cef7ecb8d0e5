//! End-to-end scenarios: Verilog text in, assertions on the resulting
//! scope tree and diagnostics out.

use sv_project::Project;
use sv_symtab::{SymbolError, SymbolTable, SymbolType};

fn build_and_resolve(sources: &[(&str, &str)]) -> (SymbolTable, Vec<SymbolError>, Vec<SymbolError>) {
    let mut project = Project::default();
    for (name, text) in sources {
        project.add_virtual_translation_unit(*name, *text);
    }
    let mut table = SymbolTable::new();
    let build_diagnostics = table.build(&mut project);
    let resolve_diagnostics = table.resolve();
    table.check_integrity();
    (table, build_diagnostics, resolve_diagnostics)
}

#[test]
fn nested_module_and_wire() {
    let (table, build_diags, resolve_diags) =
        build_and_resolve(&[("m.sv", "module m; wire w; endmodule")]);
    assert!(build_diags.is_empty());
    assert!(resolve_diags.is_empty());

    let m = table.lookup_local(table.root(), "m").expect("module m");
    assert_eq!(table.scope(m).info.metatype, SymbolType::Module);
    let w = table.lookup_local(m, "w").expect("wire w");
    assert_eq!(
        table.scope(w).info.metatype,
        SymbolType::DataNetVariableInstance
    );
    assert_eq!(table.full_path(w), "$root::m::w");
}

#[test]
fn unqualified_reference_does_not_cross_into_package() {
    let (table, build_diags, resolve_diags) = build_and_resolve(&[(
        "t.sv",
        "package p; int x; endpackage module m; initial x = 1; endmodule",
    )]);
    assert!(build_diags.is_empty());
    assert_eq!(
        resolve_diags,
        vec![SymbolError::UnresolvedUnqualified {
            name: "x".to_string(),
            context: "$root::m".to_string(),
        }]
    );
    let p = table.lookup_local(table.root(), "p").expect("package p");
    assert!(table.lookup_local(p, "x").is_some());
}

#[test]
fn scope_resolved_member_binds() {
    let (table, build_diags, resolve_diags) = build_and_resolve(&[(
        "t.sv",
        "package p; int x; endpackage module m; initial p::x = 1; endmodule",
    )]);
    assert!(build_diags.is_empty());
    assert!(resolve_diags.is_empty());

    let p = table.lookup_local(table.root(), "p").unwrap();
    let x = table.lookup_local(p, "x").unwrap();
    let m = table.lookup_local(table.root(), "m").unwrap();
    let root = table.scope(m).info.local_references_to_bind[0]
        .root
        .unwrap();
    let member = table.refs().node(root).children[0];
    assert_eq!(table.refs().node(member).component.resolved_symbol, Some(x));
    assert_eq!(table.full_path(x), "$root::p::x");
}

#[test]
fn dotted_member_resolves_through_declared_type() {
    let (table, build_diags, resolve_diags) = build_and_resolve(&[(
        "t.sv",
        "class C; int f; endclass module m; C c; initial c.f = 0; endmodule",
    )]);
    assert!(build_diags.is_empty());
    assert!(resolve_diags.is_empty());

    let c_class = table.lookup_local(table.root(), "C").unwrap();
    let f = table.lookup_local(c_class, "f").unwrap();
    let m = table.lookup_local(table.root(), "m").unwrap();
    let dotted = table
        .scope(m)
        .info
        .local_references_to_bind
        .iter()
        .filter_map(|dep| dep.root)
        .find(|&root| table.refs().node(root).component.identifier == "c")
        .expect("reference to c");
    let member = table.refs().node(dotted).children[0];
    assert_eq!(table.refs().node(member).component.resolved_symbol, Some(f));
    assert_eq!(table.full_path(f), "$root::C::f");
}

#[test]
fn out_of_line_function_with_missing_prototype_is_injected() {
    let (table, build_diags, resolve_diags) = build_and_resolve(&[(
        "t.sv",
        "class C; endclass function int C::g(); return 0; endfunction",
    )]);
    let c = table.lookup_local(table.root(), "C").unwrap();
    let g = table.lookup_local(c, "g").expect("injected member g");
    assert_eq!(table.scope(g).info.metatype, SymbolType::Function);
    assert_eq!(
        build_diags,
        vec![SymbolError::UnresolvedMember {
            name: "g".to_string(),
            metatype: SymbolType::Class,
            scope: "C".to_string(),
        }]
    );
    assert!(resolve_diags.is_empty());
}

#[test]
fn duplicate_declaration_reports_once_and_keeps_one_child() {
    let (table, build_diags, _) =
        build_and_resolve(&[("t.sv", "module m; wire w; wire w; endmodule")]);
    assert_eq!(
        build_diags,
        vec![SymbolError::DuplicateSymbol {
            name: "w".to_string(),
            scope: "$root::m".to_string(),
        }]
    );
    let m = table.lookup_local(table.root(), "m").unwrap();
    assert_eq!(table.scope(m).children().len(), 1);
}

#[test]
fn include_declares_into_including_scope_with_swapped_origin() {
    let mut project = Project::default();
    let unit = project.add_virtual_translation_unit(
        "top.sv",
        "module m;\n`include \"defs.svh\"\nendmodule",
    );
    let included = project.add_virtual_include("defs.svh", "wire from_include;");

    let mut table = SymbolTable::new();
    let build_diags = table.build(&mut project);
    assert!(build_diags.is_empty(), "unexpected: {build_diags:?}");

    let m = table.lookup_local(table.root(), "m").unwrap();
    assert_eq!(table.scope(m).info.file_origin, Some(unit));
    let w = table.lookup_local(m, "from_include").expect("included wire");
    assert_eq!(table.scope(w).info.file_origin, Some(included));
    table.check_integrity();
}

#[test]
fn missing_and_unparsable_includes_each_diagnose() {
    let mut project = Project::default();
    project.add_virtual_translation_unit(
        "top.sv",
        "module m;\n`include \"gone.svh\"\n`include \"bad.svh\"\nendmodule",
    );
    project.add_virtual_include("bad.svh", "wire w endmodule");

    let mut table = SymbolTable::new();
    let build_diags = table.build(&mut project);
    assert_eq!(build_diags.len(), 2);
    assert!(matches!(
        &build_diags[0],
        SymbolError::IncludeFailure { filename, .. } if filename == "gone.svh"
    ));
    assert!(matches!(
        &build_diags[1],
        SymbolError::IncludeFailure { filename, .. } if filename == "bad.svh"
    ));
}

#[test]
fn translation_unit_parse_failure_is_collected_and_build_continues() {
    let mut project = Project::default();
    project.add_virtual_translation_unit("bad.sv", "module m; wire w endmodule");
    project.add_virtual_translation_unit("good.sv", "module ok; endmodule");

    let mut table = SymbolTable::new();
    let build_diags = table.build(&mut project);
    assert!(matches!(
        build_diags.as_slice(),
        [SymbolError::SourceFailure { path, .. }] if path == "bad.sv"
    ));
    assert!(table.lookup_local(table.root(), "ok").is_some());
}

#[test]
fn build_single_translation_unit_by_name() {
    let mut project = Project::default();
    project.add_virtual_translation_unit("a.sv", "module a; endmodule");
    project.add_virtual_translation_unit("b.sv", "module b; endmodule");

    let mut table = SymbolTable::new();
    let diags = table.build_single_translation_unit("b.sv", &mut project);
    assert!(diags.is_empty());
    assert!(table.lookup_local(table.root(), "b").is_some());
    assert!(table.lookup_local(table.root(), "a").is_none());
}

#[test]
fn printers_show_definitions_and_references() {
    let mut project = Project::default();
    project.add_virtual_translation_unit(
        "t.sv",
        "class C; int f; endclass module m; C c; initial c.f = 0; endmodule",
    );
    let mut table = SymbolTable::new();
    let build_diags = table.build(&mut project);
    assert!(build_diags.is_empty());
    let resolve_diags = table.resolve();
    assert!(resolve_diags.is_empty());

    let definitions = table.print_symbol_definitions(&project);
    assert!(definitions.contains("$root: metatype: <root>"));
    assert!(definitions.contains("m: metatype: module, file: t.sv"));
    assert!(definitions
        .contains("c: metatype: data/net/var/instance, file: t.sv, type-info { source: \"C\""));

    let references = table.print_symbol_references();
    assert!(references.contains("@c -> $root::m::c"));
    assert!(references.contains(".f -> $root::C::f"));
}

#[test]
fn unresolved_reference_prints_as_unresolved() {
    let (table, _, resolve_diags) =
        build_and_resolve(&[("t.sv", "module m; initial nothing = 1; endmodule")]);
    assert_eq!(resolve_diags.len(), 1);
    let references = table.print_symbol_references();
    assert!(references.contains("@nothing -> <unresolved>"));
}

#[test]
fn anonymous_generate_scope_names_are_unique_within_parent() {
    let (table, build_diags, _) = build_and_resolve(&[(
        "t.sv",
        "module m; if (1) begin wire a; end if (1) begin wire b; end endmodule",
    )]);
    assert!(build_diags.is_empty());
    let m = table.lookup_local(table.root(), "m").unwrap();
    let names: Vec<_> = table
        .scope(m)
        .children()
        .iter()
        .map(|&c| table.display_name(c).to_string())
        .collect();
    assert_eq!(names, vec!["%anon-generate-0", "%anon-generate-1"]);
    assert!(names.iter().all(|n| n.starts_with('%')));
}
