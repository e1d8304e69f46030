use regex::Regex;
use std::sync::LazyLock;

const DEFAULT_CLASS_NAME: &str = "Main";

static PUBLIC_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bpublic\s+(?:(?:final|abstract|static)\s+)*class\s+([A-Za-z_$][A-Za-z0-9_$]*)")
        .expect("public class regex is valid")
});

static NON_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'(?:\\.|[^'\\\n])'|"(?:\\.|[^"\\\n])*"|//[^\n]*|(?s:/\*.*?\*/)"#)
        .expect("comment regex is valid")
});

static ANY_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bclass\s+([A-Za-z_$][A-Za-z0-9_$]*)").expect("class regex is valid")
});

/// Picks the file/class name javac and java will be invoked with.
///
/// The first `public class` wins, then the first `class` of any
/// visibility, then `Main`. Comments and literals are ignored.
pub fn detect_class_name(source: &str) -> String {
    let code = NON_CODE.replace_all(source, " ");
    [&*PUBLIC_CLASS, &*ANY_CLASS]
        .iter()
        .find_map(|re| re.captures(&code))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_CLASS_NAME.to_string())
}
