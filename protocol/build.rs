use std::{env, fs, path::Path};

// The generated code is checked into `src`. Set `REGENERATE_PROTOS=1` (and have
// `protoc` on the PATH) to rebuild it after touching anything in `protos`.
fn main() {
    println!("cargo:rerun-if-changed=protos");
    println!("cargo:rerun-if-env-changed=REGENERATE_PROTOS");
    if env::var_os("REGENERATE_PROTOS").is_none() {
        return;
    }

    let current_dir = env::current_dir().unwrap();
    let proto_path = Path::new(&current_dir).join("protos");
    let mut proto_files = vec![];
    for entry in fs::read_dir(&proto_path).unwrap() {
        let entry = entry.unwrap();
        let md = entry.metadata().unwrap();
        if md.is_file() && entry.path().extension().map_or(false, |ext| ext == "proto") {
            proto_files.push(entry.path().as_os_str().to_os_string())
        }
    }
    println!("proto_files: {:?}", proto_files);

    tonic_build::configure()
        .out_dir("src")
        .build_client(true)
        .build_server(true)
        .compile(proto_files.as_slice(), &[&proto_path])
        .unwrap();
}
