//! Walk a chain of nested ranges inside a file and report each level.
//!
//! ```text
//! cargo run --example inspect -- game.dat assets@4096+65536 tex.bin@64+0
//! ```
//!
//! Each `name@offset+length` nests inside the previous level; offsets are
//! relative to the parent and a length of 0 means "unknown".

use std::env;

use nestkit::{Error, Result, VirtualNode};

fn parse_level(arg: &str) -> Result<(&str, u64, u64)> {
    let (name, range) = arg
        .split_once('@')
        .ok_or(Error::Unsupported("expected name@offset+length"))?;
    let (offset, length) = range
        .split_once('+')
        .ok_or(Error::Unsupported("expected name@offset+length"))?;
    let offset = offset.parse().map_err(|_| Error::InvalidRange)?;
    let length = length.parse().map_err(|_| Error::InvalidRange)?;
    Ok((name, offset, length))
}

fn report(node: &VirtualNode) {
    println!(
        "{:<40} offset {:>10}  length {:>10}  magic {:02X?}  exists {}",
        node.full_path(),
        node.offset(),
        node.length(),
        node.magic(),
        node.exists()
    );
}

fn main() -> Result<()> {
    let filter = env::var("RUST_LOG").unwrap_or_else(|_| "nestkit=debug".to_string());
    tracing_subscriber::fmt().with_env_filter(&filter).init();

    let mut args = env::args().skip(1);
    let path = args
        .next()
        .ok_or(Error::Unsupported("usage: inspect <file> [name@offset+length]..."))?;

    let mut node = VirtualNode::open(path);
    report(&node);
    for arg in args {
        let (name, offset, length) = parse_level(&arg)?;
        node = VirtualNode::child(&node, name, offset, length);
        report(&node);
    }

    if let Some(bytes) = node.get_bytes() {
        let preview = &bytes[..bytes.len().min(16)];
        println!("{} bytes, starting {preview:02X?}", bytes.len());
    }
    println!("root: {}", node.virtual_root().full_path());

    Ok(())
}
