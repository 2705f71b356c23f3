use std::path::Path;

use notegate::security::path::is_within_root;
use notegate::security::{PathRejection, PathValidator};

fn validator() -> PathValidator {
    PathValidator::new("/home/user/Notes")
}

#[test]
fn plain_relative_paths_are_accepted() {
    let v = validator();
    for (raw, expected) in [
        ("Daily/2024-01-01.md", "Daily/2024-01-01.md"),
        ("Projects\\notegate.md", "Projects/notegate.md"),
        ("a/./b/c.md", "a/b/c.md"),
        ("Notes with spaces/é.md", "Notes with spaces/é.md"),
    ] {
        assert_eq!(v.validate(raw).unwrap().as_str(), expected, "{raw}");
    }
}

#[test]
fn every_escape_vector_is_refused() {
    let v = validator();
    let cases: &[(&str, PathRejection)] = &[
        ("", PathRejection::Empty),
        ("   ", PathRejection::Empty),
        ("a\0b.md", PathRejection::NulByte),
        ("../../etc/passwd", PathRejection::Traversal),
        ("Daily/../../secret.md", PathRejection::Traversal),
        ("Daily\\..\\..\\secret.md", PathRejection::Traversal),
        ("%2e%2e/secret.md", PathRejection::EncodedTraversal),
        ("%2E%2E%2Fsecret.md", PathRejection::EncodedTraversal),
        ("%252e%252e/secret.md", PathRejection::EncodedTraversal),
        ("~/.ssh/id_rsa", PathRejection::HomeExpansion),
        ("$HOME/notes.md", PathRejection::VariableExpansion),
        ("/etc/passwd", PathRejection::Absolute),
        ("\\\\server\\share\\x.md", PathRejection::Absolute),
        ("D:/notes.md", PathRejection::Absolute),
        (".obsidian/workspace.json", PathRejection::HiddenSegment(".obsidian".into())),
        ("Projects/.git/config", PathRejection::HiddenSegment(".git".into())),
        (".", PathRejection::RootItself),
        ("./", PathRejection::RootItself),
    ];
    for (raw, expected) in cases {
        assert_eq!(v.validate(raw).as_ref(), Err(expected), "{raw:?}");
    }
}

#[test]
fn validated_paths_always_resolve_inside_the_root() {
    let v = validator();
    let inputs = [
        "a.md",
        "deep/er/still/deeper.md",
        "./x/./y.md",
        "x//y.md",
        "..",
        "a/..",
        "a/../../b",
        "/abs",
        ".hidden",
        "~",
        "%2e%2e",
    ];
    for raw in inputs {
        if let Ok(path) = v.validate(raw) {
            let resolved = path.resolve(v.root());
            assert!(
                is_within_root(v.root(), &resolved) && resolved != v.root(),
                "{raw} escaped to {}",
                resolved.display()
            );
        }
    }
}

#[test]
fn containment_is_not_a_string_prefix() {
    let root = Path::new("/home/user/Notes");
    assert!(!is_within_root(root, Path::new("/home/user/Notes-evil/x.md")));
    assert!(!is_within_root(root, Path::new("/home/user/NotesX")));
    assert!(!is_within_root(root, Path::new("/home/user")));
    assert!(is_within_root(root, Path::new("/home/user/Notes/x.md")));
}

#[test]
fn default_extension_is_appended_and_others_rejected() {
    let v = validator();
    assert_eq!(
        v.validate_with_extension("Inbox/idea", true).unwrap().as_str(),
        "Inbox/idea.md"
    );
    assert_eq!(
        v.validate_with_extension("Inbox/idea", false).unwrap().as_str(),
        "Inbox/idea"
    );
    assert!(matches!(
        v.validate_with_extension("script.sh", true),
        Err(PathRejection::DisallowedExtension { .. })
    ));

    let txt = PathValidator::new("/vault").with_extensions(["md", ".TXT"], "txt");
    assert_eq!(txt.validate_with_extension("log", true).unwrap().as_str(), "log.txt");
    assert!(txt.validate_with_extension("log.txt", true).is_ok());
}

#[test]
fn trailing_dots_take_the_default_extension() {
    let v = validator();
    assert_eq!(v.validate_with_extension("foo.", true).unwrap().as_str(), "foo.md");
    assert_eq!(
        v.validate_with_extension("Inbox/idea.", true).unwrap().as_str(),
        "Inbox/idea.md"
    );
    assert!(matches!(
        v.validate_with_extension("notes.json.", true),
        Err(PathRejection::DisallowedExtension { .. })
    ));
    assert_eq!(v.validate_with_extension("foo.", false).unwrap().as_str(), "foo.");
}

#[test]
fn folders_accept_the_root() {
    let v = validator();
    assert_eq!(v.validate_folder("").unwrap(), None);
    assert_eq!(v.validate_folder("/").unwrap(), None);
    assert_eq!(v.validate_folder(".").unwrap(), None);
    assert_eq!(
        v.validate_folder("Projects/").unwrap().unwrap().as_str(),
        "Projects"
    );
    assert_eq!(v.validate_folder("../x"), Err(PathRejection::Traversal));
}
