use std::fs;

use protoschema::{DescriptorPool, ErrorRecord, FileState, NodeKind};
use tempfile::TempDir;

fn write_files(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, source) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, source).unwrap();
    }
    dir
}

#[test]
fn parse_directory() {
    let dir = write_files(&[
        (
            "main.proto",
            "syntax = \"proto3\";\npackage app;\nimport \"common/types.proto\";\n\nmessage Request {\n  common.Id id = 1;\n  map<string, common.Id> aliases = 2;\n}\n",
        ),
        (
            "common/types.proto",
            "syntax = \"proto3\";\npackage common;\n\nmessage Id {\n  fixed64 value = 1;\n}\n",
        ),
        ("unused.proto", "package unused; message Unused {}"),
        ("notes.txt", "not a schema"),
    ]);

    let mut pool = DescriptorPool::new();
    let names = pool.add_directory(dir.path()).unwrap();
    assert_eq!(names, ["common/types.proto", "main.proto", "unused.proto"]);

    pool.enqueue("main.proto");
    let mut errors: Vec<ErrorRecord> = Vec::new();
    pool.run(&mut errors).unwrap();
    assert!(errors.is_empty());

    let request = pool.lookup_message("app.Request").unwrap();
    assert_eq!(request.line(), 5);
    let aliases = request.field_by_number(2).unwrap();
    assert_eq!(aliases.kind(), NodeKind::MapField);
    assert_eq!(aliases.type_ref(), Some("AliasesEntry"));

    let id = pool.lookup_message(".common.Id").unwrap();
    assert_eq!(id.field_by_number(1).unwrap().type_ref(), Some("fixed64"));

    assert!(pool.package("unused").is_none());
    assert_eq!(
        pool.file("unused.proto").unwrap().state(),
        FileState::Registered
    );
    assert_eq!(
        pool.file("main.proto").unwrap().dependencies(),
        ["common/types.proto"]
    );
}

#[test]
fn earlier_directory_takes_precedence() {
    let first = write_files(&[("shared.proto", "package first; message M {}")]);
    let second = write_files(&[
        ("shared.proto", "package second; message M {}"),
        ("extra.proto", "package second; import 'shared.proto'; message Extra {}"),
    ]);

    let mut pool = DescriptorPool::new();
    assert_eq!(pool.add_directory(first.path()).unwrap(), ["shared.proto"]);
    assert_eq!(pool.add_directory(second.path()).unwrap(), ["extra.proto"]);

    pool.enqueue("extra.proto");
    pool.run(&mut Vec::<ErrorRecord>::new()).unwrap();

    assert!(pool.lookup_message("first.M").is_some());
    assert!(pool.lookup_message("second.M").is_none());
    assert!(pool.lookup_message("second.Extra").is_some());
}

#[test]
fn error_in_imported_file() {
    let dir = write_files(&[
        ("root.proto", "package root;\nimport 'broken.proto';\nmessage Root {}\n"),
        (
            "broken.proto",
            "package broken;\n\nmessage Broken {\n  int32 a = 1\n}\n",
        ),
    ]);

    let mut pool = DescriptorPool::new();
    pool.add_directory(dir.path()).unwrap();
    pool.enqueue("root.proto");

    let mut errors: Vec<ErrorRecord> = Vec::new();
    let err = pool.run(&mut errors).unwrap_err();

    assert_eq!(err.file(), Some("broken.proto"));
    assert_eq!(err.line(), Some(5));
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].to_string(),
        "Protobuf: Parsing file [broken.proto:5] failed: expected ';', but found '}'"
    );

    assert!(pool.lookup_message("root.Root").is_some());
    assert!(pool.package("broken").is_none());
    assert_eq!(pool.pending().collect::<Vec<_>>(), ["broken.proto"]);
}

#[test]
fn invalid_utf8_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.proto"), b"message \xff {}").unwrap();

    let mut pool = DescriptorPool::new();
    pool.add_directory(dir.path()).unwrap();
    pool.enqueue("bad.proto");

    let mut errors: Vec<ErrorRecord> = Vec::new();
    let err = pool.run(&mut errors).unwrap_err();

    assert!(err.is_parse());
    assert_eq!(err.to_string(), "file 'bad.proto' is not valid utf-8");
    assert_eq!(errors[0].line, -1);
}

#[test]
fn missing_directory() {
    let dir = tempfile::tempdir().unwrap();

    let mut pool = DescriptorPool::new();
    let err = pool.add_directory(dir.path().join("missing")).unwrap_err();

    assert!(err.is_io());
    assert_eq!(pool.files().len(), 0);
}
