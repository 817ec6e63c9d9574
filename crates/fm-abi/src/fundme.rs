use alloy_sol_types::sol;

sol! {
    /// Public surface of the deployed FundMe contract.
    #[sol(all_derives)]
    interface IFundMe {
        error FundMe__NotOwner();

        function MINIMUM_USD() external view returns (uint256);
        function fund() external payable;
        function withdraw() external;
        function getAddressToAmountFunded(address fundingAddress) external view returns (uint256);
        function getFunders(uint256 index) external view returns (address);
        function getOwner() external view returns (address);
        function getVersion() external view returns (uint256);
    }
}

#[cfg(test)]
mod tests {
    use super::IFundMe;
    use alloy_primitives::{Address, U256, hex};
    use alloy_sol_types::{SolCall, SolError, SolInterface, SolValue};

    #[test]
    fn selectors_match_deployed_contract() {
        let cases = [
            (IFundMe::MINIMUM_USDCall::SELECTOR, "6b69a592"),
            (IFundMe::fundCall::SELECTOR, "b60d4288"),
            (IFundMe::getAddressToAmountFundedCall::SELECTOR, "0343fb25"),
            (IFundMe::getFundersCall::SELECTOR, "3a7b6c74"),
            (IFundMe::getOwnerCall::SELECTOR, "893d20e8"),
            (IFundMe::getVersionCall::SELECTOR, "0d8e6e2c"),
            (IFundMe::withdrawCall::SELECTOR, "3ccfd60b"),
        ];
        for (selector, expected) in cases {
            assert_eq!(hex::encode(selector), expected);
        }
        assert_eq!(hex::encode(IFundMe::FundMe__NotOwner::SELECTOR), "579610db");
    }

    #[test]
    fn encodes_address_argument() {
        let who: Address = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap();
        let data = IFundMe::getAddressToAmountFundedCall { fundingAddress: who }.abi_encode();
        assert_eq!(data.len(), 36);
        assert!(data[4..16].iter().all(|b| *b == 0));

        match IFundMe::IFundMeCalls::abi_decode(&data).unwrap() {
            IFundMe::IFundMeCalls::getAddressToAmountFunded(call) => assert_eq!(call.fundingAddress, who),
            other => panic!("decoded as {other:?}"),
        }
    }

    #[test]
    fn decodes_uint_returns_wider_than_128_bits() {
        let huge = U256::from(u128::MAX) * U256::from(3u64);
        let encoded = huge.abi_encode();
        assert_eq!(IFundMe::MINIMUM_USDCall::abi_decode_returns(&encoded).unwrap(), huge);
        assert_eq!(IFundMe::getVersionCall::abi_decode_returns(&U256::MAX.abi_encode()).unwrap(), U256::MAX);
    }

    #[test]
    fn rejects_short_return_data() {
        assert!(IFundMe::getOwnerCall::abi_decode_returns(&[0_u8; 4]).is_err());
    }
}
