// ABOUTME: Command registry mapping LaTeX command names to token kinds,
// Unicode symbol normalisation, and Levenshtein-based suggestions

use crate::token::TokenKind;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Maximum edit distance for a suggestion to be offered.
const SUGGESTION_DISTANCE: usize = 2;

/// The closed catalogue of recognised commands.
///
/// Greek letters, quantifiers, and set operators lex as ordinary variables;
/// arrow relations are transparent (Ignored); `\approx` behaves as an
/// equality-flavoured comparison.
static COMMANDS: LazyLock<HashMap<&'static str, TokenKind>> = LazyLock::new(|| {
    let mut table = HashMap::new();
    register_operators(&mut table);
    register_structural(&mut table);
    register_functions(&mut table);
    register_constants(&mut table);
    register_symbols(&mut table);
    register_cosmetic(&mut table);
    table
});

fn register_operators(table: &mut HashMap<&'static str, TokenKind>) {
    table.insert("times", TokenKind::Star);
    table.insert("cdot", TokenKind::Star);
    table.insert("div", TokenKind::Slash);
    table.insert("leq", TokenKind::LessEq);
    table.insert("le", TokenKind::LessEq);
    table.insert("geq", TokenKind::GreaterEq);
    table.insert("ge", TokenKind::GreaterEq);
    table.insert("neq", TokenKind::NotEq);
    table.insert("ne", TokenKind::NotEq);
    table.insert("in", TokenKind::Member);
    table.insert("approx", TokenKind::Equals);
    table.insert("land", TokenKind::And);
    table.insert("wedge", TokenKind::And);
    table.insert("lor", TokenKind::Or);
    table.insert("vee", TokenKind::Or);
    table.insert("oplus", TokenKind::Xor);
    table.insert("lnot", TokenKind::Not);
    table.insert("neg", TokenKind::Not);
}

fn register_structural(table: &mut HashMap<&'static str, TokenKind>) {
    table.insert("frac", TokenKind::Frac);
    table.insert("dfrac", TokenKind::Frac);
    table.insert("tfrac", TokenKind::Frac);
    table.insert("binom", TokenKind::Binom);
    table.insert("sqrt", TokenKind::Sqrt);
    table.insert("lim", TokenKind::Lim);
    table.insert("sum", TokenKind::Sum);
    table.insert("prod", TokenKind::Prod);
    table.insert("int", TokenKind::Int);
    table.insert("iint", TokenKind::IInt);
    table.insert("iiint", TokenKind::IIInt);
    table.insert("oint", TokenKind::OInt);
    table.insert("partial", TokenKind::Partial);
    table.insert("nabla", TokenKind::Nabla);
    table.insert("begin", TokenKind::Begin);
    table.insert("end", TokenKind::End);
    table.insert("text", TokenKind::Text);
    table.insert("to", TokenKind::To);
    table.insert("rightarrow", TokenKind::To);
    table.insert("langle", TokenKind::LAngle);
    table.insert("rangle", TokenKind::RAngle);
}

fn register_functions(table: &mut HashMap<&'static str, TokenKind>) {
    const FUNCTIONS: &[&str] = &[
        // Trig and inverse trig
        "sin", "cos", "tan", "cot", "sec", "csc", "arcsin", "arccos", "arctan", "arccot",
        "arcsec", "arccsc", "asin", "acos", "atan", "acot", "asec", "acsc",
        // Hyperbolic and inverse hyperbolic
        "sinh", "cosh", "tanh", "coth", "arcsinh", "arccosh", "arctanh", "asinh", "acosh",
        "atanh",
        // Exponential and logarithmic
        "exp", "ln", "log",
        // Roots, magnitudes, rounding
        "abs", "sign", "floor", "ceil", "round",
        // Number theory and combinatorics
        "gcd", "lcm", "min", "max", "factorial",
        // Linear algebra
        "det", "trace", "dot", "cross", "normalize",
        // Decorations (identity on evaluation, structurally distinct)
        "ddot", "bar", "hat", "vec",
    ];
    for name in FUNCTIONS {
        table.insert(name, TokenKind::Function);
    }
    // `\dot` is both the derivative decoration and (with two arguments)
    // the vector dot product; one Function entry covers both.
    table.insert("dot", TokenKind::Function);
}

fn register_constants(table: &mut HashMap<&'static str, TokenKind>) {
    table.insert("pi", TokenKind::Constant);
    table.insert("tau", TokenKind::Constant);
    table.insert("phi", TokenKind::Constant);
    table.insert("infty", TokenKind::Infinity);
}

fn register_symbols(table: &mut HashMap<&'static str, TokenKind>) {
    const VARIABLES: &[&str] = &[
        // Greek lowercase (pi, tau, phi are constants; see above)
        "alpha", "beta", "gamma", "delta", "epsilon", "varepsilon", "zeta", "eta", "theta",
        "vartheta", "iota", "kappa", "lambda", "mu", "nu", "xi", "rho", "varrho", "sigma",
        "varsigma", "upsilon", "varphi", "varpi", "chi", "psi", "omega",
        // Greek uppercase
        "Gamma", "Delta", "Theta", "Lambda", "Xi", "Pi", "Sigma", "Upsilon", "Phi", "Psi",
        "Omega",
        // Quantifiers and set operators lex as uninterpreted symbols
        "forall", "exists", "cup", "cap", "setminus", "subset", "subseteq", "supset",
        "supseteq",
    ];
    for name in VARIABLES {
        table.insert(name, TokenKind::Variable);
    }
}

fn register_cosmetic(table: &mut HashMap<&'static str, TokenKind>) {
    const IGNORED: &[&str] = &[
        "left", "right", "big", "Big", "bigg", "Bigg", "displaystyle", "limits", "nolimits",
        // Arrow relations are transparent
        "propto", "mapsto", "Rightarrow", "Leftarrow", "Leftrightarrow",
    ];
    for name in IGNORED {
        table.insert(name, TokenKind::Ignored);
    }
    const SPACING: &[&str] = &["quad", "qquad", "thinspace", "medspace", "thickspace"];
    for name in SPACING {
        table.insert(name, TokenKind::Spacing);
    }
    const FONTS: &[&str] = &["mathbf", "mathrm", "mathbb", "mathcal", "boldsymbol"];
    for name in FONTS {
        table.insert(name, TokenKind::Font);
    }
}

/// Common misspellings mapped to their canonical command.
/// Checked before the Levenshtein search so e.g. "squareroot" resolves
/// even though its edit distance from "sqrt" is large.
const ALIASES: &[(&str, &str)] = &[
    ("sine", "sin"),
    ("cosine", "cos"),
    ("tangent", "tan"),
    ("cotangent", "cot"),
    ("secant", "sec"),
    ("cosecant", "csc"),
    ("squareroot", "sqrt"),
    ("sqroot", "sqrt"),
    ("root", "sqrt"),
    ("absolute", "abs"),
    ("logarithm", "log"),
    ("naturallog", "ln"),
    ("exponential", "exp"),
    ("infinity", "infty"),
    ("integral", "int"),
    ("summation", "sum"),
    ("product", "prod"),
    ("limit", "lim"),
    ("fraction", "frac"),
    ("determinant", "det"),
    ("multiply", "times"),
    ("divide", "div"),
];

/// Look up a backslashed command name in the registry.
pub fn lookup(name: &str) -> Option<TokenKind> {
    COMMANDS.get(name).copied()
}

/// Rewrite a Unicode math symbol to its canonical command name.
pub fn normalize_unicode(c: char) -> Option<&'static str> {
    let name = match c {
        'π' => "pi",
        'τ' => "tau",
        'φ' | 'ϕ' => "phi",
        '∞' => "infty",
        '√' => "sqrt",
        '∑' => "sum",
        '∏' => "prod",
        '∫' => "int",
        '∂' => "partial",
        '∇' => "nabla",
        '×' => "times",
        '·' => "cdot",
        '÷' => "div",
        '≤' => "leq",
        '≥' => "geq",
        '≠' => "neq",
        '≈' => "approx",
        '∈' => "in",
        '∀' => "forall",
        '∃' => "exists",
        '∪' => "cup",
        '∩' => "cap",
        '⊂' => "subset",
        '⊆' => "subseteq",
        '⊃' => "supset",
        '⊇' => "supseteq",
        '∧' => "land",
        '∨' => "lor",
        '¬' => "lnot",
        '⟨' => "langle",
        '⟩' => "rangle",
        'α' => "alpha",
        'β' => "beta",
        'γ' => "gamma",
        'δ' => "delta",
        'ε' => "epsilon",
        'ζ' => "zeta",
        'η' => "eta",
        'θ' => "theta",
        'ι' => "iota",
        'κ' => "kappa",
        'λ' => "lambda",
        'μ' => "mu",
        'ν' => "nu",
        'ξ' => "xi",
        'ρ' => "rho",
        'σ' => "sigma",
        'υ' => "upsilon",
        'χ' => "chi",
        'ψ' => "psi",
        'ω' => "omega",
        'Γ' => "Gamma",
        'Δ' => "Delta",
        'Θ' => "Theta",
        'Λ' => "Lambda",
        'Ξ' => "Xi",
        'Π' => "Pi",
        'Σ' => "Sigma",
        'Υ' => "Upsilon",
        'Φ' => "Phi",
        'Ψ' => "Psi",
        'Ω' => "Omega",
        _ => return None,
    };
    Some(name)
}

/// Suggest the closest known command for an unrecognised name.
///
/// The alias table is consulted first (exact match), then a Levenshtein
/// search over the registry with a small distance threshold.
pub fn suggest(name: &str) -> Option<String> {
    let lowered = name.to_lowercase();
    for (alias, canonical) in ALIASES {
        if *alias == lowered {
            return Some(format!("\\{canonical}"));
        }
    }

    let first = lowered.chars().next();
    let mut best: Option<(&str, (usize, bool, &str))> = None;
    for candidate in COMMANDS.keys() {
        let dist = strsim::levenshtein(&lowered, &candidate.to_lowercase());
        if dist > SUGGESTION_DISTANCE {
            continue;
        }
        // Rank by distance, then shared leading character, then name, so
        // the suggestion is deterministic across map iteration orders.
        let rank = (dist, candidate.chars().next() != first, *candidate);
        match best {
            None => best = Some((candidate, rank)),
            Some((_, r)) if rank < r => best = Some((candidate, rank)),
            _ => {}
        }
    }
    best.map(|(s, _)| format!("\\{s}"))
}

/// All registered command names, for extension-registry collision checks.
pub fn known_commands() -> impl Iterator<Item = &'static str> {
    COMMANDS.keys().copied()
}
