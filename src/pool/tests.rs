use proptest::prelude::*;

use super::*;
use crate::Syntax;

fn pool_with(files: &[(&str, &str)]) -> DescriptorPool {
    let mut pool = DescriptorPool::new();
    for &(name, source) in files {
        pool.add_source(name, source);
    }
    pool
}

fn child_names(node: &ProtoNode) -> Vec<&str> {
    node.children().iter().map(|child| child.name()).collect()
}

#[test]
fn merge_files_into_package() {
    let mut pool = pool_with(&[
        ("a.proto", "package p; message A {}"),
        ("b.proto", "package p; message B { string s = 1; }"),
    ]);
    assert!(pool.enqueue("a.proto"));
    assert!(pool.enqueue("b.proto"));

    let mut errors: Vec<ErrorRecord> = Vec::new();
    pool.run(&mut errors).unwrap();
    assert_eq!(errors, vec![]);

    assert_eq!(pool.packages().len(), 1);
    assert_eq!(child_names(pool.package("p").unwrap()), ["A", "B"]);

    let b = pool.lookup_message(".p.B").unwrap();
    assert_eq!(b.find_child_by_number(1).unwrap().type_ref(), Some("string"));
    assert_eq!(pool.lookup_message("p.A").unwrap().line(), 1);

    for name in ["a.proto", "b.proto"] {
        let file = pool.file(name).unwrap();
        assert_eq!(file.state(), FileState::Parsed);
        assert_eq!(file.package_name(), "p");
    }
    assert_eq!(pool.pending().len(), 0);
}

#[test]
fn merged_messages_keep_their_fields() {
    let mut pool = pool_with(&[
        ("file1.proto", "package p; message A { int32 x = 1; }"),
        ("file2.proto", "package p; message B { int32 y = 1; }"),
    ]);
    pool.enqueue("file1.proto");
    pool.enqueue("file2.proto");
    pool.run(&mut Vec::<ErrorRecord>::new()).unwrap();

    let package = pool.package("p").unwrap();
    assert_eq!(child_names(package), ["A", "B"]);
    for message in package.children() {
        assert_eq!(message.kind(), NodeKind::Message);
        assert_eq!(message.fields().count(), 1);
    }
}

#[test]
fn missing_message_name() {
    let mut pool = pool_with(&[("bad.proto", "message { int32 x = 1; }")]);
    pool.enqueue("bad.proto");

    let mut errors: Vec<ErrorRecord> = Vec::new();
    pool.run(&mut errors).unwrap_err();

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line, 1);
    assert_eq!(pool.packages().len(), 0);
}

#[test]
fn syntax_error_stops_run() {
    let mut pool = pool_with(&[
        ("good.proto", "package p; message Good {}"),
        ("bad.proto", "package q;\nmessage {"),
        ("later.proto", "package r; message Later {}"),
    ]);
    pool.enqueue("good.proto");
    pool.enqueue("bad.proto");
    pool.enqueue("later.proto");

    let mut errors: Vec<ErrorRecord> = Vec::new();
    let err = pool.run(&mut errors).unwrap_err();

    assert!(err.is_parse());
    assert_eq!(err.file(), Some("bad.proto"));
    assert_eq!(
        errors,
        vec![ErrorRecord {
            message: "expected an identifier, but found '{'".to_owned(),
            file: "bad.proto".to_owned(),
            line: 2,
        }]
    );

    // Nothing from the failed file reaches the pool.
    assert!(pool.package("q").is_none());
    assert!(pool.package("p").is_some());
    assert!(pool.package("r").is_none());

    assert_eq!(pool.file("bad.proto").unwrap().state(), FileState::Failed);
    assert_eq!(pool.file("later.proto").unwrap().state(), FileState::Registered);
    assert_eq!(
        pool.pending().collect::<Vec<_>>(),
        ["bad.proto", "later.proto"]
    );
}

#[test]
fn continue_after_error() {
    let mut pool = pool_with(&[
        ("bad.proto", "message Foo { int32 a = 0; }"),
        ("worse.proto", "syntax = 'proto4';"),
        ("good.proto", "package p; message Good {}"),
    ]);
    pool.stop_on_error(false);
    pool.enqueue("bad.proto");
    pool.enqueue("worse.proto");
    pool.enqueue("good.proto");

    let mut errors: Vec<ErrorRecord> = Vec::new();
    let err = pool.run(&mut errors).unwrap_err();

    assert_eq!(err.file(), Some("bad.proto"));
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].file, "bad.proto");
    assert_eq!(errors[1].file, "worse.proto");
    assert_eq!(errors[1].message, "unknown syntax 'proto4'");

    assert!(pool.lookup_message("p.Good").is_some());
    assert_eq!(pool.pending().len(), 0);

    // Files that failed are not retried.
    assert!(!pool.enqueue("bad.proto"));
}

#[test]
fn imports_are_followed_once() {
    let mut pool = pool_with(&[
        (
            "a.proto",
            "package p; import 'b.proto'; import 'c.proto'; message A {}",
        ),
        (
            "b.proto",
            "package p; import 'a.proto'; import 'c.proto'; message B {}",
        ),
        ("c.proto", "package p; import public 'a.proto'; message C {}"),
    ]);
    pool.enqueue("a.proto");

    let mut errors: Vec<ErrorRecord> = Vec::new();
    pool.run(&mut errors).unwrap();
    assert!(errors.is_empty());

    assert_eq!(child_names(pool.package("p").unwrap()), ["A", "B", "C"]);
    assert_eq!(
        pool.file("a.proto").unwrap().dependencies(),
        ["b.proto", "c.proto"]
    );
    assert!(pool
        .files()
        .all(|file| file.state() == FileState::Parsed));
}

#[test]
fn enqueue_skips_known_files() {
    let mut pool = pool_with(&[("a.proto", "message A {}")]);

    assert!(pool.enqueue("a.proto"));
    assert!(!pool.enqueue("a.proto"));
    assert_eq!(pool.pending().collect::<Vec<_>>(), ["a.proto"]);

    pool.run(&mut Vec::<ErrorRecord>::new()).unwrap();
    assert!(!pool.enqueue("a.proto"));
    assert_eq!(pool.package("").map(child_names), Some(vec!["A"]));
}

#[test]
fn queue_keeps_order_after_failure() {
    let mut pool = pool_with(&[
        ("a.proto", "import 'c.proto'; message A {}"),
        ("b.proto", "message B {"),
        ("c.proto", "message C {}"),
    ]);
    assert!(pool.enqueue("a.proto"));
    assert!(pool.enqueue("b.proto"));
    assert!(pool.enqueue("c.proto"));
    assert!(!pool.enqueue("b.proto"));

    pool.run(&mut Vec::<ErrorRecord>::new()).unwrap_err();

    assert_eq!(pool.pending().collect::<Vec<_>>(), ["b.proto", "c.proto"]);
    assert!(!pool.enqueue("c.proto"));
    assert!(!pool.enqueue("a.proto"));
    assert_eq!(pool.pending().len(), 2);
}

#[test]
fn missing_import() {
    let mut pool = pool_with(&[("a.proto", "package p; import 'missing.proto'; message A {}")]);
    pool.enqueue("a.proto");

    let mut errors = Vec::new();
    let err = pool
        .run(&mut |record: &ErrorRecord| errors.push(record.to_string()))
        .unwrap_err();

    assert!(err.is_import_not_found());
    assert_eq!(
        errors,
        ["Protobuf: Parsing file [missing.proto] failed: import 'missing.proto' not found"]
    );
    assert!(pool.lookup_message("p.A").is_some());
    assert_eq!(pool.pending().collect::<Vec<_>>(), ["missing.proto"]);
}

#[test]
fn missing_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();

    let mut pool = DescriptorPool::new();
    pool.add_file("gone.proto", dir.path().join("gone.proto"));
    pool.enqueue("gone.proto");

    let mut errors: Vec<ErrorRecord> = Vec::new();
    let err = pool.run(&mut errors).unwrap_err();

    assert!(err.is_io());
    assert_eq!(errors[0].file, "gone.proto");
    assert_eq!(errors[0].line, -1);
    assert_eq!(pool.file("gone.proto").unwrap().state(), FileState::Failed);
}

#[test]
fn nesting_limit() {
    let mut pool = pool_with(&[("deep.proto", "message A {\n  message B {\n    message C {}\n  }\n}")]);
    pool.max_nesting_depth(2);
    pool.enqueue("deep.proto");

    let mut errors: Vec<ErrorRecord> = Vec::new();
    let err = pool.run(&mut errors).unwrap_err();

    assert_eq!(err.line(), Some(3));
    assert_eq!(
        errors[0].message,
        "messages may not be nested more than 2 levels deep"
    );
    assert!(pool.packages().next().is_none());
}

#[test]
fn service_methods() {
    let mut pool = pool_with(&[(
        "svc.proto",
        "syntax = 'proto3'; package svc.v1; service S { rpc Call (stream Req) returns (Res); stream Both (Req, Res); }",
    )]);
    pool.enqueue("svc.proto");
    pool.run(&mut Vec::<ErrorRecord>::new()).unwrap();

    assert_eq!(pool.file("svc.proto").unwrap().syntax(), Syntax::Proto3);

    let service = pool.lookup_service("svc.v1.S").unwrap();
    let call = service.find_child_by_name("Call").unwrap();
    assert_eq!(call.input_type(), Some("Req"));
    assert_eq!(call.output_type(), Some("Res"));
    assert!(call.flags().client_streaming);
    assert!(!call.flags().server_streaming);

    let both = service.find_child_by_name("Both").unwrap();
    assert!(both.flags().client_streaming && both.flags().server_streaming);
}

#[test]
fn map_and_group_fields() {
    let mut pool = pool_with(&[(
        "m.proto",
        "package m; message M { map<string, int32> word_counts = 1 [deprecated = true]; optional group Data = 2 { optional int32 x = 3; } }",
    )]);
    pool.enqueue("m.proto");
    pool.run(&mut Vec::<ErrorRecord>::new()).unwrap();

    let message = pool.lookup_message("m.M").unwrap();
    let map = message.field_by_number(1).unwrap();
    assert_eq!(map.kind(), NodeKind::MapField);
    assert_eq!(map.type_ref(), Some("WordCountsEntry"));
    assert_eq!(map.children().len(), 2);
    let value = map.field_by_number(2).unwrap();
    assert_eq!(value.name(), "value");
    assert_eq!(value.type_ref(), Some("int32"));
    assert_eq!(value.label(), None);

    let group = message.field_by_number(2).unwrap();
    assert_eq!(group.name(), "data");
    assert!(group.flags().group);
    assert!(pool.lookup_message("m.M.Data").is_some());
    assert!(pool.lookup_message("m.M.data").is_none());
}

#[test]
fn options_are_discarded() {
    let mut pool = pool_with(&[(
        "o.proto",
        "package o; option java_package = 'x'; message M { reserved 10 to 20; option deprecated = true; int32 a = 1 [packed = true]; }",
    )]);
    pool.enqueue("o.proto");
    pool.run(&mut Vec::<ErrorRecord>::new()).unwrap();

    let message = pool.lookup_message("o.M").unwrap();
    assert_eq!(child_names(message), ["a"]);
    assert_eq!(message.children()[0].option("packed"), Some("true"));
    assert_eq!(child_names(pool.package("o").unwrap()), ["M"]);
}

#[test]
fn lookup_nested_names() {
    let mut pool = pool_with(&[
        (
            "a.proto",
            "package a.b; message Outer { message Inner { enum Kind { X = 0; } } }",
        ),
        ("b.proto", "package a; message b { message C {} }"),
        ("c.proto", "message Top {}"),
    ]);
    pool.enqueue("a.proto");
    pool.enqueue("b.proto");
    pool.enqueue("c.proto");
    pool.run(&mut Vec::<ErrorRecord>::new()).unwrap();

    assert!(pool.lookup_message("a.b.Outer.Inner").is_some());
    assert!(pool.lookup_enum(".a.b.Outer.Inner.Kind").is_some());
    assert!(pool.lookup_enum("a.b.Outer.Inner").is_none());
    assert!(pool.lookup_message("a.b.Outer.Missing").is_none());
    assert!(pool.lookup_message("Top").is_some());
    assert!(pool.lookup_message(".Top").is_some());

    // 'a.b' is a package, but 'C' is only declared in message 'b' of package 'a'.
    assert_eq!(pool.lookup_message("a.b.C").unwrap().name(), "C");

    assert_eq!(
        pool.packages().map(ProtoNode::name).collect::<Vec<_>>(),
        ["", "a", "a.b"]
    );
}

#[test]
fn merge_keeps_first_package_line() {
    let mut pool = DescriptorPool::new();
    pool.merge_package(ProtoNode::builder(NodeKind::Package).line(4).finish("p"));
    pool.merge_package(ProtoNode::builder(NodeKind::Package).line(9).finish("p"));

    assert_eq!(pool.package("p").unwrap().line(), 4);
}

#[test]
fn extend_blocks_are_messages() {
    let mut pool = pool_with(&[(
        "ext.proto",
        "package p; message Foo { extensions 1 to max; } extend Foo { optional int32 x = 1; }",
    )]);
    pool.enqueue("ext.proto");
    pool.run(&mut Vec::<ErrorRecord>::new()).unwrap();

    let extend = pool.lookup_message("p.FooExtend").unwrap();
    assert_eq!(extend.kind(), NodeKind::Message);
    assert_eq!(extend.type_ref(), Some("Foo"));
    assert_eq!(extend.line(), 1);
    assert_eq!(extend.field_by_number(1).unwrap().name(), "x");
    assert_eq!(pool.lookup_message(".p.Foo").unwrap().type_ref(), None);
}

/// A file declaring one of each kind of definition for every given name.
fn schema_source(names: &[String]) -> String {
    let mut source = String::from("package p;\n");
    for name in names {
        source.push_str(&format!(
            r#"
message {0} {{
  extensions 100 to max;
  optional int32 id = 1;
  oneof choice {{
    string text = 2;
    group {0}Group = 3 {{ optional int32 x = 1; }}
  }}
  map<string, {0}> children = 4 [deprecated = true];
  enum {0}Kind {{ UNKNOWN = 0; }}
}}
enum {0}State {{ NONE = 0; }}
extend {0} {{ optional string note = 100; }}
service {0}Service {{ rpc Get ({0}) returns ({0}); }}
"#,
            name
        ));
    }
    source
}

fn schema_names() -> impl Strategy<Value = (Vec<String>, usize)> {
    prop::collection::btree_set("[A-Z][a-z]{0,6}", 1..6).prop_flat_map(|names| {
        let len = names.len();
        (Just(names.into_iter().collect::<Vec<_>>()), 0..=len)
    })
}

fn parse_in_order(files: &[(&str, String)]) -> DescriptorPool {
    let mut pool = DescriptorPool::new();
    for (name, source) in files {
        pool.add_source(*name, source.as_str());
        pool.enqueue(*name);
    }
    pool.run(&mut Vec::<ErrorRecord>::new()).unwrap();
    pool
}

fn package_contents(pool: &DescriptorPool) -> Vec<(String, Vec<String>)> {
    pool.packages()
        .map(|package| {
            let mut children: Vec<String> =
                package.children().iter().map(ToString::to_string).collect();
            children.sort();
            (package.name().to_owned(), children)
        })
        .collect()
}

fn collect_unnamed<'a>(node: &'a ProtoNode, path: &mut Vec<&'a str>, unnamed: &mut Vec<String>) {
    for child in node.children() {
        if child.name().is_empty() {
            unnamed.push(format!("{:?} under '{}'", child.kind(), path.join(".")));
        }
        path.push(child.name());
        collect_unnamed(child, path, unnamed);
        path.pop();
    }
}

proptest! {
    #[test]
    fn merge_order_does_not_change_contents((names, split) in schema_names()) {
        let a = ("a.proto", schema_source(&names[..split]));
        let b = ("b.proto", schema_source(&names[split..]));

        let forward = parse_in_order(&[a.clone(), b.clone()]);
        let backward = parse_in_order(&[b, a]);

        prop_assert_eq!(forward.packages().len(), 1);
        prop_assert_eq!(package_contents(&forward), package_contents(&backward));
    }

    #[test]
    fn every_node_is_named((names, split) in schema_names()) {
        let pool = parse_in_order(&[
            ("a.proto", schema_source(&names[..split])),
            ("b.proto", schema_source(&names[split..])),
        ]);

        let mut unnamed = Vec::new();
        for package in pool.packages() {
            collect_unnamed(package, &mut vec![package.name()], &mut unnamed);
        }
        prop_assert!(unnamed.is_empty(), "unnamed nodes: {:?}", unnamed);

        for name in &names {
            let group = format!("p.{}.{}Group", name, name);
            let extend = format!("p.{}Extend", name);
            let kind = format!(".p.{0}.{0}Kind", name);
            let service = format!("p.{}Service", name);
            prop_assert!(pool.lookup_message(&group).is_some());
            prop_assert!(pool.lookup_message(&extend).is_some());
            prop_assert!(pool.lookup_enum(&kind).is_some());
            prop_assert!(pool.lookup_service(&service).is_some());
        }
    }
}
