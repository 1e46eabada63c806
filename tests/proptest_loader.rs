//! Property-based tests for iNES loading.

use nes_cpu::cartridge::{
    Cartridge, FormatError, HeaderPolicy, LoadError, LoadOptions, CHR_BANK_LEN, HEADER_LEN,
    PRG_BANK_LEN, TRAINER_LEN,
};
use proptest::prelude::*;

fn options(policy: HeaderPolicy) -> LoadOptions {
    LoadOptions { policy }
}

fn header(prg_banks: u8, chr_banks: u8, trainer: bool) -> Vec<u8> {
    let mut data = vec![0x4E, 0x45, 0x53, 0x1A, prg_banks, chr_banks];
    data.push(if trainer { 0x04 } else { 0x00 });
    data.resize(HEADER_LEN, 0);
    data
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: arbitrary input never panics under either policy
    #[test]
    fn prop_loader_is_total(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = Cartridge::from_slice(&data, options(HeaderPolicy::Strict));
        let _ = Cartridge::load_with(data, options(HeaderPolicy::Lenient));
    }

    /// Property: arbitrary header bytes behind a valid signature never panic
    #[test]
    fn prop_arbitrary_headers_are_total(
        fields in any::<[u8; 12]>(),
        body in prop::collection::vec(any::<u8>(), 0..1024),
    ) {
        let mut data = b"NES\x1A".to_vec();
        data.extend_from_slice(&fields);
        data.extend(body);
        for policy in [HeaderPolicy::Strict, HeaderPolicy::Lenient] {
            match Cartridge::from_slice(&data, options(policy)) {
                Ok(cart) => {
                    prop_assert!(cart.prg_bank_count() > 0);
                    prop_assert!(cart.header().expected_len() <= data.len());
                }
                Err(LoadError::InvalidFormat(FormatError::BadMagic)) => {
                    prop_assert!(false, "signature was valid");
                }
                Err(_) => {}
            }
        }
    }

    /// Property: the declared size decides between truncation, exact fit
    /// and trailing data
    #[test]
    fn prop_size_mismatch_classification(
        prg_banks in 1u8..=3,
        chr_banks in 0u8..=2,
        trainer in any::<bool>(),
        slack in -3i32..=3,
    ) {
        let mut data = header(prg_banks, chr_banks, trainer);
        let expected = HEADER_LEN
            + if trainer { TRAINER_LEN } else { 0 }
            + prg_banks as usize * PRG_BANK_LEN
            + chr_banks as usize * CHR_BANK_LEN;
        let actual = (expected as i32 + slack) as usize;
        data.resize(actual, 0xEA);

        let strict = Cartridge::from_slice(&data, options(HeaderPolicy::Strict));
        let lenient = Cartridge::from_slice(&data, options(HeaderPolicy::Lenient));

        if slack < 0 {
            let truncated = LoadError::TruncatedImage { expected, actual };
            prop_assert_eq!(strict.unwrap_err(), truncated.clone());
            prop_assert_eq!(lenient.unwrap_err(), truncated);
        } else if slack == 0 {
            prop_assert!(strict.is_ok());
            prop_assert!(lenient.is_ok());
        } else {
            prop_assert_eq!(
                strict.unwrap_err(),
                LoadError::InvalidFormat(FormatError::TrailingData { expected, actual })
            );
            let cart = lenient.unwrap();
            prop_assert_eq!(cart.prg_rom().len(), prg_banks as usize * PRG_BANK_LEN);
            prop_assert_eq!(cart.chr_rom().len(), chr_banks as usize * CHR_BANK_LEN);
            prop_assert_eq!(cart.trainer().is_some(), trainer);
        }
    }
}
