//! Crate-wide error type built with `error_chain`.

error_chain! {
    foreign_links {
        Io(::std::io::Error);
        Json(::serde_json::Error);
    }

    errors {
        LatticeParse(file: String, line: usize, msg: String) {
            description("lattice file could not be parsed")
            display("{}:{}: {}", file, line, msg)
        }
        NumericalDegeneracy(what: String) {
            description("numerical degeneracy detected")
            display("numerical degeneracy: {}", what)
        }
    }
}
