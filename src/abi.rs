alloy::sol! {
    /// Optional ERC-20 metadata extension, only the symbol is used.
    #[derive(Debug)]
    #[sol(rpc)]
    interface IERC20Metadata {
        function symbol() external view returns (string);
    }
}

alloy::sol! {
    /// Bonding-curve pool created by the launchpad factory.
    ///
    /// Selectors are `0xd6febde8` for `buy` and `0xd3c9727c` for `sell`.
    /// The amount received is read from the return data when the trade is
    /// simulated with `eth_call`, a pool returning nothing yields no quote.
    #[derive(Debug)]
    #[sol(rpc)]
    interface LaunchPool {
        function buy(uint256 minTokensOut, uint256 deadline) external payable returns (uint256);
        function sell(uint256 tokenAmountIn, uint256 minRefund, uint256 deadline) external returns (uint256);
    }
}
