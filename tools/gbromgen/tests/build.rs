//! Full builds through a stand-in makebin

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use gbromgen::header::ROM_BANK_SIZE;
use gbromgen::{BuildOptions, CartridgeSpec, RomError, build};

/// A makebin that copies `base.bin` next to it to its last argument
fn fake_makebin(dir: &Path, exit_code: i32) -> PathBuf {
    let script = dir.join("makebin.sh");
    let base = dir.join("base.bin");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\nfor last; do :; done\ncp '{}' \"$last\"\nexit {}\n",
            base.display(),
            exit_code
        ),
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script
}

fn project(exit_code: i32) -> (tempfile::TempDir, CartridgeSpec, BuildOptions) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("base.bin"), vec![0u8; 0x150]).unwrap();
    fs::write(dir.path().join("game.noi"), "DEF _on_vblank 0x200\n").unwrap();
    fs::write(dir.path().join("game.ihx"), ":00000001FF\n").unwrap();
    fs::write(
        dir.path().join("rom.json"),
        r#"{ "hex": "game.ihx", "name": "TEST", "vblank": "on_vblank" }"#,
    )
    .unwrap();

    let spec = CartridgeSpec::load(&dir.path().join("rom.json")).unwrap();
    let options = BuildOptions {
        makebin: fake_makebin(dir.path(), exit_code),
    };
    (dir, spec, options)
}

#[test]
fn builds_through_makebin() {
    let (dir, spec, options) = project(0);

    let report = build(&spec, &options).unwrap();
    let image = fs::read(dir.path().join("game.gb")).unwrap();

    assert_eq!(report.size, 2 * ROM_BANK_SIZE);
    assert_eq!(image.len(), 2 * ROM_BANK_SIZE);
    assert_eq!(&image[0x40..0x43], [0xC3, 0x00, 0x02]);
}

#[test]
fn makebin_failure_is_fatal() {
    let (dir, spec, options) = project(3);

    let err = build(&spec, &options).unwrap_err();

    assert!(matches!(err, RomError::ExternalToolFailure { .. }));
    assert!(!dir.path().join("game.gb").exists());
}
