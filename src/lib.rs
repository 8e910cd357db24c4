/*!
# imaging-codecs

`imaging-codecs` is a pure Rust library bundling four image codec engines:
a simplified JPEG 2000 Part 1 codestream encoder/decoder, a CCITT Group 3/4
fax encoder/decoder, a GIF87a/89a encoder/decoder (LZW plus the container
format), and a Truevision TGA encoder/decoder.

## Supported codecs

### JPEG 2000 (ISO/IEC 15444-1, simplified subset)
- **Status**: Complete for the subset this crate targets.
- **Features**: CDF 9/7 (lossy) and CDF 5/3 (lossless) DWT, scalar
  quantization, EBCOT Tier-1 (MQ-coded bit-plane passes), simplified Tier-2
  packet framing, SOC/SIZ/COD/QCD/SOT/SOD/EOC marker codestream, RCT/ICT
  multi-component transform.
- **Modules**: `jpeg2000`
- **Not implemented**: full Part 1 conformance, JP2/JPX boxes, color
  management, multi-tile-part progressive refinement.

### CCITT Group 3/4 fax (ITU-T T.4 / T.6)
- **Status**: Complete for the subset this crate targets.
- **Features**: Modified Huffman 1-D coding, Modified READ / MMR 2-D
  coding, damaged-row tolerance.
- **Modules**: `ccitt`
- **Not implemented**: the uncompressed-mode extension.

### GIF (GIF87a/89a)
- **Status**: Complete for the subset this crate targets.
- **Features**: variable-width LZW, logical screen / color tables,
  graphics control and NETSCAPE2.0 loop extensions, Adam7-style
  interlacing on decode.
- **Modules**: `gif`
- **Not implemented**: frame disposal-method compositing.

### TGA (Truevision TGA)
- **Status**: Complete for the subset this crate targets.
- **Features**: header/RLE/orientation handling, 16/24/32-bit and
  grayscale/palette pixel formats, normalization to top-down BGRA.
- **Modules**: `tga`
- **Not implemented**: the TGA 2.0 footer/extension area.
*/

pub mod bitio;
pub mod ccitt;
pub mod error;
pub mod gif;
pub mod jpeg2000;
pub mod tga;

pub use ccitt::{decode as ccitt_decode, encode as ccitt_encode, CcittOptions};
pub use error::{Error, Result};
pub use gif::{decode as gif_decode, encode as gif_encode, GifFile, GifImage};
pub use jpeg2000::{decode as j2k_decode, encode as j2k_encode, DecodedImage};
pub use tga::{decode as tga_decode, encode as tga_encode, TgaImage};
