//! JPEG frame slicing out of a raw MJPEG byte stream.
//!
//! ESP32-CAM streams are multipart/x-mixed-replace, but the boundary lines
//! are not trustworthy across firmware builds.  The markers are: every JPEG
//! begins with SOI (`FF D8`) and ends with EOI (`FF D9`), so we scan for
//! those and throw the boundary chatter away.

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Pull the next complete JPEG out of `buffer`, draining the consumed bytes.
///
/// Bytes before the first SOI are discarded.  If no SOI is present the
/// buffer is reduced to at most one byte (a trailing `FF` may be the first
/// half of a marker split across reads).  A SOI without a following EOI
/// leaves the partial frame in place for the next read to complete.
pub fn extract_jpeg(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let Some(start) = find_marker(buffer, &SOI) else {
        if buffer.len() > 1 {
            buffer.drain(..buffer.len() - 1);
        }
        return None;
    };

    if start > 0 {
        buffer.drain(..start);
    }

    // Search past the SOI so a stray D9 in the garbage can't truncate us.
    let end = find_marker(&buffer[SOI.len()..], &EOI)? + SOI.len() + EOI.len();
    let frame = buffer[..end].to_vec();
    buffer.drain(..end);
    Some(frame)
}

fn find_marker(buffer: &[u8], marker: &[u8]) -> Option<usize> {
    buffer
        .windows(marker.len())
        .position(|window| window == marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jpeg(payload: &[u8]) -> Vec<u8> {
        let mut frame = SOI.to_vec();
        frame.extend_from_slice(payload);
        frame.extend_from_slice(&EOI);
        frame
    }

    #[test]
    fn extracts_frames_in_order_with_padding() {
        let frames: Vec<Vec<u8>> = (0u8..4).map(|i| fake_jpeg(&[i, i, i])).collect();
        let mut buffer = Vec::new();
        for frame in &frames {
            buffer.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
            buffer.extend_from_slice(frame);
            buffer.extend_from_slice(b"\r\n");
        }

        let mut out = Vec::new();
        while let Some(frame) = extract_jpeg(&mut buffer) {
            out.push(frame);
        }
        assert_eq!(out, frames);
    }

    #[test]
    fn partial_frame_survives_across_reads() {
        let frame = fake_jpeg(&[1, 2, 3, 4, 5]);
        let (head, tail) = frame.split_at(4);

        let mut buffer = head.to_vec();
        assert_eq!(extract_jpeg(&mut buffer), None);
        assert_eq!(buffer, head);

        buffer.extend_from_slice(tail);
        assert_eq!(extract_jpeg(&mut buffer), Some(frame));
        assert!(buffer.is_empty());
    }

    #[test]
    fn garbage_without_soi_is_discarded() {
        let mut buffer = vec![0x00, 0x11, 0x22, 0x33, 0xFF];
        assert_eq!(extract_jpeg(&mut buffer), None);
        // Keeps the trailing byte in case it opens a split marker.
        assert_eq!(buffer, vec![0xFF]);

        buffer.extend_from_slice(&[0xD8, 0xAA, 0xFF, 0xD9]);
        assert_eq!(extract_jpeg(&mut buffer), Some(vec![0xFF, 0xD8, 0xAA, 0xFF, 0xD9]));
    }

    #[test]
    fn stray_eoi_before_soi_is_ignored() {
        let frame = fake_jpeg(&[9, 9]);
        let mut buffer = vec![0xFF, 0xD9, 0x00];
        buffer.extend_from_slice(&frame);
        assert_eq!(extract_jpeg(&mut buffer), Some(frame));
        assert!(buffer.is_empty());
    }
}
