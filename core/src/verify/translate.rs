//! Plain-language translation of diagnostic codes (spec §4.8): a fixed
//! dictionary mapping type-checker and lint rule IDs to friendly sentences,
//! deduplicated and capped at 5 for the delta emitted to the user.

const DICTIONARY: &[(&str, &str)] = &[
    ("TS2304", "A name is used that doesn't exist anywhere in the file or its imports."),
    ("TS2322", "A value doesn't match the type it's being assigned to."),
    ("TS2339", "Code is trying to use a property that doesn't exist on that type."),
    ("TS2307", "An import points to a module that can't be found."),
    ("TS2345", "A function is being called with the wrong kind of argument."),
    ("TS7006", "A function parameter has no inferred type and needs an explicit one."),
    ("no-unused-vars", "A variable is declared but never used."),
    ("react-hooks/rules-of-hooks", "A React hook is called somewhere hooks aren't allowed (conditionally or in a loop)."),
    ("react-hooks/exhaustive-deps", "A hook's dependency list is missing a value it actually uses."),
    ("import/no-unresolved", "An import points to a file that can't be resolved."),
    ("no-undef", "Code refers to a name that was never defined or imported."),
];

fn code_in(line: &str, code: &str) -> bool {
    line.contains(code)
}

/// Maps each diagnostic string to a friendly sentence when its code is
/// recognized, deduplicates, and caps at 5 entries (spec §4.8: "emits a
/// deduplicated top-5 list as a delta").
pub fn translate_errors(diagnostics: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for diagnostic in diagnostics {
        if let Some((_, sentence)) = DICTIONARY.iter().find(|(code, _)| code_in(diagnostic, code)) {
            if !out.contains(&sentence.to_string()) {
                out.push(sentence.to_string());
            }
        }
        if out.len() == 5 {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_known_code() {
        let out = translate_errors(&["src/App.tsx(1,1): error TS2304: Cannot find name 'x'.".to_string()]);
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("doesn't exist"));
    }

    #[test]
    fn unknown_code_yields_nothing() {
        let out = translate_errors(&["some unrelated error".to_string()]);
        assert!(out.is_empty());
    }

    #[test]
    fn dedups_and_caps_at_five() {
        let diagnostics: Vec<String> = (0..10)
            .map(|_| "error TS2304: Cannot find name 'x'.".to_string())
            .collect();
        let out = translate_errors(&diagnostics);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn caps_distinct_codes_at_five() {
        let diagnostics = vec![
            "TS2304".to_string(),
            "TS2322".to_string(),
            "TS2339".to_string(),
            "TS2307".to_string(),
            "TS2345".to_string(),
            "TS7006".to_string(),
        ];
        let out = translate_errors(&diagnostics);
        assert_eq!(out.len(), 5);
    }
}
