use super::*;

#[test]
fn mul_div255_rounds_to_nearest() {
    assert_eq!(mul_div255_u8(255, 255), 255);
    assert_eq!(mul_div255_u8(128, 255), 128);
    assert_eq!(mul_div255_u8(204, 128), 102);
    assert_eq!(mul_div255_u8(0, 200), 0);
}

#[test]
fn unit_to_u8_matches_color_quantization() {
    assert_eq!(unit_to_u8(0.8), 204);
    assert_eq!(unit_to_u8(0.3), 77);
    assert_eq!(unit_to_u8(0.1), 26);
    assert_eq!(unit_to_u8(-1.0), 0);
    assert_eq!(unit_to_u8(2.0), 255);
}

#[test]
fn div_round_handles_signs() {
    assert_eq!(div_round_i128(7, 2), 4);
    assert_eq!(div_round_i128(-7, 2), -4);
    assert_eq!(div_round_i128(200, 6000), 0);
    assert_eq!(div_round_i128(5, 0), 0);
}

#[test]
fn gcd_is_positive() {
    assert_eq!(gcd_i64(600, 90000), 600);
    assert_eq!(gcd_i64(-4, 6), 2);
    assert_eq!(gcd_i64(0, 9), 9);
}
