//! Language detection and definitions for 19+ programming languages

use std::collections::HashMap;
use once_cell::sync::Lazy;

#[derive(Debug, Clone)]
pub struct Language {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

/// All supported languages (19+ total)
pub static LANGUAGES: Lazy<Vec<Language>> = Lazy::new(|| vec![
    // Systems Programming
    Language {
        name: "C",
        extensions: &["c", "h"],
    },
    Language {
        name: "C++",
        extensions: &["cpp", "hpp", "cc", "cxx", "hxx"],
    },
    Language {
        name: "Rust",
        extensions: &["rs"],
    },
    Language {
        name: "Go",
        extensions: &["go"],
    },
    Language {
        name: "Zig",
        extensions: &["zig"],
    },
    
    // Web Languages
    Language {
        name: "JavaScript",
        extensions: &["js", "mjs", "cjs"],
    },
    Language {
        name: "TypeScript",
        extensions: &["ts", "tsx"],
    },
    Language {
        name: "HTML",
        extensions: &["html", "htm"],
    },
    Language {
        name: "CSS",
        extensions: &["css"],
    },
    Language {
        name: "SCSS",
        extensions: &["scss"],
    },
    Language {
        name: "SASS",
        extensions: &["sass"],
    },
    Language {
        name: "Less",
        extensions: &["less"],
    },
    
    // Scripting Languages
    Language {
        name: "Python",
        extensions: &["py", "pyw"],
    },
    Language {
        name: "Ruby",
        extensions: &["rb"],
    },
    Language {
        name: "Perl",
        extensions: &["pl", "pm"],
    },
    Language {
        name: "Lua",
        extensions: &["lua"],
    },
    Language {
        name: "PHP",
        extensions: &["php"],
    },
    
    // JVM Languages
    Language {
        name: "Java",
        extensions: &["java"],
    },
    Language {
        name: "Kotlin",
        extensions: &["kt", "kts"],
    },
    Language {
        name: "Scala",
        extensions: &["scala"],
    },
    Language {
        name: "Groovy",
        extensions: &["groovy"],
    },
    Language {
        name: "Clojure",
        extensions: &["clj", "cljs"],
    },
    
    // .NET Languages
    Language {
        name: "C#",
        extensions: &["cs"],
    },
    Language {
        name: "F#",
        extensions: &["fs", "fsx"],
    },
    Language {
        name: "Visual Basic",
        extensions: &["vb"],
    },
    
    // Functional Languages
    Language {
        name: "Haskell",
        extensions: &["hs"],
    },
    Language {
        name: "OCaml",
        extensions: &["ml", "mli"],
    },
    Language {
        name: "Erlang",
        extensions: &["erl"],
    },
    Language {
        name: "Elixir",
        extensions: &["ex", "exs"],
    },
    Language {
        name: "Elm",
        extensions: &["elm"],
    },
    Language {
        name: "PureScript",
        extensions: &["purs"],
    },
    Language {
        name: "Reason",
        extensions: &["re"],
    },
    
    // Shell Languages
    Language {
        name: "Bash",
        extensions: &["sh", "bash"],
    },
    Language {
        name: "Zsh",
        extensions: &["zsh"],
    },
    Language {
        name: "Fish",
        extensions: &["fish"],
    },
    Language {
        name: "PowerShell",
        extensions: &["ps1"],
    },
    
    // Data & Config Languages
    Language {
        name: "JSON",
        extensions: &["json"],
    },
    Language {
        name: "YAML",
        extensions: &["yaml", "yml"],
    },
    Language {
        name: "TOML",
        extensions: &["toml"],
    },
    Language {
        name: "XML",
        extensions: &["xml"],
    },
    Language {
        name: "INI",
        extensions: &["ini"],
    },
    
    // Database Languages
    Language {
        name: "SQL",
        extensions: &["sql"],
    },
    Language {
        name: "PostgreSQL",
        extensions: &["pgsql"],
    },
    Language {
        name: "MySQL",
        extensions: &["mysql"],
    },
    
    // Mobile Development
    Language {
        name: "Swift",
        extensions: &["swift"],
    },
    Language {
        name: "Objective-C",
        extensions: &["m", "mm"],
    },
    Language {
        name: "Dart",
        extensions: &["dart"],
    },
    
    // Markup & Documentation
    Language {
        name: "Markdown",
        extensions: &["md", "markdown"],
    },
    Language {
        name: "LaTeX",
        extensions: &["tex"],
    },
    Language {
        name: "AsciiDoc",
        extensions: &["adoc", "asciidoc"],
    },
    Language {
        name: "reStructuredText",
        extensions: &["rst"],
    },
    
    // Modern Web Frameworks
    Language {
        name: "Vue",
        extensions: &["vue"],
    },
    Language {
        name: "Svelte",
        extensions: &["svelte"],
    },
    Language {
        name: "Astro",
        extensions: &["astro"],
    },
    
    // Additional languages (extending to 19+)
    Language { name: "Ada", extensions: &["ada", "adb", "ads"] },
    Language { name: "Assembly", extensions: &["asm", "s"] },
    Language { name: "AWK", extensions: &["awk"] },
    Language { name: "Bison", extensions: &["y"] },
    Language { name: "Blade", extensions: &["blade.php"] },
    Language { name: "Cairo", extensions: &["cairo"] },
    Language { name: "CMake", extensions: &["cmake"] },
    Language { name: "COBOL", extensions: &["cob", "cbl"] },
    Language { name: "CoffeeScript", extensions: &["coffee"] },
    Language { name: "Common Lisp", extensions: &["lisp", "cl"] },
    Language { name: "Crystal", extensions: &["cr"] },
    Language { name: "D", extensions: &["d"] },
    Language { name: "Dockerfile", extensions: &["dockerfile"] },
    Language { name: "Emacs Lisp", extensions: &["el"] },
    Language { name: "Fortran", extensions: &["f90", "f95"] },
    Language { name: "GDScript", extensions: &["gd"] },
    Language { name: "GLSL", extensions: &["glsl", "vert", "frag"] },
    Language { name: "GraphQL", extensions: &["graphql", "gql"] },
    Language { name: "Hack", extensions: &["hack"] },
    Language { name: "Handlebars", extensions: &["hbs"] },
    Language { name: "Haxe", extensions: &["hx"] },
    Language { name: "HCL", extensions: &["hcl"] },
    Language { name: "Janet", extensions: &["janet"] },
    Language { name: "Julia", extensions: &["jl"] },
    Language { name: "Liquid", extensions: &["liquid"] },
    Language { name: "Makefile", extensions: &["makefile", "mk"] },
    Language { name: "MATLAB", extensions: &["m"] },
    Language { name: "Nim", extensions: &["nim"] },
    Language { name: "Nix", extensions: &["nix"] },
    Language { name: "Objective-C++", extensions: &["mm"] },
    Language { name: "Pascal", extensions: &["pas"] },
    Language { name: "Pug", extensions: &["pug"] },
    Language { name: "R", extensions: &["r"] },
    Language { name: "Racket", extensions: &["rkt"] },
    Language { name: "Raku", extensions: &["raku", "p6"] },
    Language { name: "Scheme", extensions: &["scm"] },
    Language { name: "Solidity", extensions: &["sol"] },
    Language { name: "Starlark", extensions: &["bzl"] },
    Language { name: "Stylus", extensions: &["styl"] },
    Language { name: "Tcl", extensions: &["tcl"] },
    Language { name: "Terraform", extensions: &["tf"] },
    Language { name: "Vala", extensions: &["vala"] },
    Language { name: "Verilog", extensions: &["v"] },
    Language { name: "VHDL", extensions: &["vhd"] },
    Language { name: "Vim Script", extensions: &["vim"] },
    Language { name: "WebAssembly", extensions: &["wat"] },
]);

/// Extension to language mapping cache
static EXT_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for lang in LANGUAGES.iter() {
        for ext in lang.extensions {
            map.insert(*ext, lang.name);
        }
    }
    map
});

/// Detect language from file path
pub fn detect_language(path: &str) -> &'static str {
    if let Some(ext) = path.rsplit('.').next() {
        if let Some(&lang) = EXT_MAP.get(ext) {
            return lang;
        }
    }
    "Unknown"
}

/// Whether `path`'s filename matches the *active* language's own source
/// matcher, not merely some language's. `language_id` is the lowercase
/// project config id (e.g. `"rust"`, `"typescript"`); a file recognized as
/// belonging to a different language is not a match even though it's a
/// known extension.
pub fn matches_language(path: &str, language_id: &str) -> bool {
    detect_language(path).eq_ignore_ascii_case(language_id)
        || detect_language(path).eq_ignore_ascii_case(&display_alias(language_id))
}

/// A handful of language ids whose canonical display name differs from a
/// simple case-fold of the config id (`"cpp"` -> `"C++"`, etc.).
fn display_alias(language_id: &str) -> String {
    match language_id {
        "cpp" => "C++".to_string(),
        "csharp" => "C#".to_string(),
        "fsharp" => "F#".to_string(),
        "objective-c" | "objc" => "Objective-C".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_detection() {
        assert_eq!(detect_language("main.rs"), "Rust");
        assert_eq!(detect_language("app.js"), "JavaScript");
        assert_eq!(detect_language("server.py"), "Python");
        assert_eq!(detect_language("Main.java"), "Java");
        assert_eq!(detect_language("unknown.xyz"), "Unknown");
    }

    #[test]
    fn test_all_languages_have_extensions() {
        for lang in LANGUAGES.iter() {
            assert!(!lang.extensions.is_empty(), "{} has no extensions", lang.name);
        }
    }

    #[test]
    fn test_matches_language_rejects_other_known_languages() {
        assert!(matches_language("main.rs", "rust"));
        assert!(!matches_language("main.py", "rust"));
        assert!(matches_language("app.ts", "typescript"));
    }

    #[test]
    fn test_extension_map_size() {
        // Extensions can be shared (e.g., ".m" for both Objective-C and MATLAB)
        // Just verify the map is populated
        assert!(!EXT_MAP.is_empty(), "Extension map should not be empty");
        assert!(EXT_MAP.len() >= 100, "Should have at least 100 unique extensions");
    }
}
