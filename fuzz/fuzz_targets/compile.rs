#![no_main]

use libfuzzer_sys::fuzz_target;
use prequel_core::compiler::{compile, CompileRequest, QueryFile};

// The parser and inferrer are total: any input must come back as
// statements plus diagnostics, never a panic.
fuzz_target!(|data: &[u8]| {
    if let Ok(sql) = std::str::from_utf8(data) {
        let request = CompileRequest {
            migrations: Vec::new(),
            queries: vec![QueryFile {
                name: "fuzz.sql".to_string(),
                sql: sql.to_string(),
            }],
            config: Default::default(),
        };
        let _ = compile(&request);
    }
});
