fn main() {
    cxx_build::bridge("src/linekv_ffi.rs")
        .flag_if_supported("-std=c++17")
        .compile("linekv-ffi");

    println!("cargo:rerun-if-changed=src/linekv_ffi.rs");
}
