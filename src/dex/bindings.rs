//! `abigen!` handles for the UniswapV2-style contracts the bootstrapper drives.

use ethers::contract::abigen;

abigen!(
    UniswapV2Factory,
    r"[
        function getPair(address tokenA, address tokenB) external view returns (address pair)
        function createPair(address tokenA, address tokenB) external returns (address pair)
    ]",
);

abigen!(
    UniswapV2Router02,
    r"[
        function factory() external pure returns (address)
        function WETH() external pure returns (address)
        function addLiquidity(address tokenA, address tokenB, uint256 amountADesired, uint256 amountBDesired, uint256 amountAMin, uint256 amountBMin, address to, uint256 deadline) external returns (uint256 amountA, uint256 amountB, uint256 liquidity)
        function addLiquidityETH(address token, uint256 amountTokenDesired, uint256 amountTokenMin, uint256 amountETHMin, address to, uint256 deadline) external payable returns (uint256 amountToken, uint256 amountETH, uint256 liquidity)
    ]",
);

abigen!(
    UniswapV2Pair,
    r"[
        function token0() external view returns (address)
        function token1() external view returns (address)
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast)
        function mint(address to) external returns (uint256 liquidity)
        function totalSupply() external view returns (uint256)
    ]",
);

abigen!(
    Erc20,
    r"[
        function approve(address spender, uint256 amount) external returns (bool)
        function allowance(address owner, address spender) external view returns (uint256)
        function balanceOf(address account) external view returns (uint256)
        function transfer(address to, uint256 amount) external returns (bool)
        function decimals() external view returns (uint8)
        function symbol() external view returns (string)
    ]",
);

abigen!(
    WrappedNative,
    r"[
        function deposit() external payable
    ]",
);
