#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write a gray 4:2:0 Y4M clip of `frames` frames at `fps_num:fps_den`
pub fn write_y4m(dir: &Path, name: &str, frames: usize, fps_num: u32, fps_den: u32) -> PathBuf {
    let (width, height) = (8usize, 6usize);
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    writeln!(
        file,
        "YUV4MPEG2 W{} H{} F{}:{} Ip A1:1 C420jpeg",
        width, height, fps_num, fps_den
    )
    .unwrap();

    let chroma = (width / 2) * (height / 2);
    for i in 0..frames {
        file.write_all(b"FRAME\n").unwrap();
        file.write_all(&vec![(i % 200) as u8 + 16; width * height]).unwrap();
        file.write_all(&vec![128; chroma * 2]).unwrap();
    }
    path
}
